//! K-Way Stream Merger
//!
//! Merges the per-file ingestion streams of one logical group into a single
//! ordered, deduplicated stream. The merge is cooperative and round-based:
//! every still-open input contributes one event per round, and the round's
//! executions are sorted and merged by benchmark identity.
//!
//! Precondition (unverified): each file presents the same benchmark at the
//! same relative round position. Misaligned files are outside the contract.

use crate::execution::Execution;
use crate::stream::{EventReceiver, EventSender, ExecutionEvent};
use crate::EVENT_CHANNEL_CAPACITY;
use std::thread;
use tracing::debug;

/// Merge `inputs` into one stream: `Start`, per-round sorted and
/// benchmark-merged `Next` events, then `End` once every input has ended.
/// `Error` events pass through immediately.
pub fn merge_streams(inputs: Vec<EventReceiver>) -> EventReceiver {
    let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
    thread::spawn(move || run_rounds(inputs, &tx));
    rx
}

fn run_rounds(inputs: Vec<EventReceiver>, tx: &EventSender) {
    if tx.send(ExecutionEvent::Start).is_err() {
        return;
    }

    let mut slots: Vec<Option<EventReceiver>> = inputs.into_iter().map(Some).collect();
    let mut rounds = 0usize;

    while slots.iter().any(Option::is_some) {
        rounds += 1;
        let mut collected: Vec<Execution> = Vec::new();

        for slot in &mut slots {
            let Some(rx) = slot else { continue };
            match rx.recv() {
                Ok(ExecutionEvent::Start) => {}
                Ok(ExecutionEvent::Next(exec)) => collected.push(*exec),
                Ok(ExecutionEvent::Error(e)) => {
                    if tx.send(ExecutionEvent::Error(e)).is_err() {
                        return;
                    }
                }
                // A dropped sender (cancelled producer) closes the input
                // like a regular End.
                Ok(ExecutionEvent::End) | Err(_) => *slot = None,
            }
        }

        if !emit_merged(collected, tx) {
            return;
        }
    }

    debug!(rounds, "stream merge finished");
    let _ = tx.send(ExecutionEvent::End);
}

/// Sort one round's executions by benchmark, merge adjacent equal-benchmark
/// executions, and emit one `Next` per distinct benchmark. Returns false if
/// the consumer is gone.
fn emit_merged(mut collected: Vec<Execution>, tx: &EventSender) -> bool {
    collected.sort_by(|a, b| a.benchmark().cmp(b.benchmark()));

    let mut iter = collected.into_iter();
    let Some(mut prev) = iter.next() else {
        return true;
    };
    for exec in iter {
        if prev.benchmark() == exec.benchmark() {
            if let Err(e) = prev.merge(exec) {
                // Equal benchmarks were just checked; a failure here means
                // the tree broke its own invariant.
                panic!("could not merge executions: {e}");
            }
        } else {
            let done = std::mem::replace(&mut prev, exec);
            if tx.send(ExecutionEvent::Next(Box::new(done))).is_err() {
                return false;
            }
        }
    }
    tx.send(ExecutionEvent::Next(Box::new(prev))).is_ok()
}
