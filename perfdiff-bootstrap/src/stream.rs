//! CI Stream
//!
//! Adapts one tagged execution stream into a stream of per-benchmark
//! confidence intervals. Ingestion errors pass through as values; framing
//! events carry no payload and are consumed silently.

use crate::engine::{execution_cis, CiContext};
use perfdiff_bench::{Benchmark, EventReceiver, ExecutionEvent, IngestError};
use perfdiff_stats::Ci;
use std::thread;

/// Confidence intervals for one benchmark, one entry per significance level.
#[derive(Debug, Clone)]
pub struct BenchmarkCis {
    /// The benchmark identity.
    pub benchmark: Benchmark,
    /// One interval per configured significance level.
    pub cis: Vec<Ci>,
}

/// Receiving half of a CI result stream.
pub type CiReceiver = crossbeam_channel::Receiver<Result<BenchmarkCis, IngestError>>;

/// Spawn a consumer of `events` that bootstraps every `Next` execution and
/// forwards every `Error` as an `Err` result.
pub fn ci_stream(events: EventReceiver, ctx: CiContext) -> CiReceiver {
    let (tx, rx) = crossbeam_channel::bounded(perfdiff_bench::EVENT_CHANNEL_CAPACITY);
    thread::spawn(move || {
        for event in events.iter() {
            let result = match event {
                ExecutionEvent::Start | ExecutionEvent::End => continue,
                ExecutionEvent::Error(e) => Err(e),
                ExecutionEvent::Next(exec) => Ok(BenchmarkCis {
                    benchmark: exec.benchmark().clone(),
                    cis: execution_cis(&exec, &ctx),
                }),
            };
            if tx.send(result).is_err() {
                return;
            }
        }
    });
    rx
}
