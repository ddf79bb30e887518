//! Two-Stream Comparator
//!
//! Joins two benchmark-ascending execution streams by identity: benchmarks
//! present on both sides get a paired ratio result, benchmarks present on one
//! side only get a one-sided confidence interval. The join is a merge-join
//! automaton with a single carried-over execution as its only state.
//!
//! Output order is benchmark-ascending, contingent on both inputs being
//! benchmark-ascending (an unverified precondition).

use crate::engine::{execution_cis, ratio_cis, CiContext, RatioCis};
use crate::stream::BenchmarkCis;
use perfdiff_bench::{Benchmark, EventReceiver, Execution, ExecutionEvent, IngestError};
use std::cmp::Ordering;
use std::fmt;
use std::thread;

/// Which input stream a one-sided result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first (control) stream.
    A,
    /// The second (test) stream.
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Paired result for a benchmark present on both sides.
#[derive(Debug, Clone)]
pub struct BenchmarkRatio {
    /// The benchmark identity.
    pub benchmark: Benchmark,
    /// Per-side and ratio intervals, one entry per significance level.
    pub cis: RatioCis,
}

/// One comparator output.
#[derive(Debug, Clone)]
pub enum CompareResult {
    /// The benchmark appeared on one side only.
    OneSided {
        /// Stream the benchmark appeared on.
        side: Side,
        /// Its confidence intervals.
        result: BenchmarkCis,
    },
    /// The benchmark appeared on both sides.
    Ratio(BenchmarkRatio),
}

/// Receiving half of a comparison result stream.
pub type CompareReceiver = crossbeam_channel::Receiver<Result<CompareResult, IngestError>>;

/// Unmatched execution held between join rounds.
enum Carry {
    None,
    A(Box<Execution>),
    B(Box<Execution>),
}

/// Spawn the merge-join over streams `a` and `b`.
pub fn compare_streams(a: EventReceiver, b: EventReceiver, ctx: CiContext) -> CompareReceiver {
    let (tx, rx) = crossbeam_channel::bounded(perfdiff_bench::EVENT_CHANNEL_CAPACITY);
    thread::spawn(move || join_streams(&a, &b, &ctx, &tx));
    rx
}

fn join_streams(
    a: &EventReceiver,
    b: &EventReceiver,
    ctx: &CiContext,
    tx: &crossbeam_channel::Sender<Result<CompareResult, IngestError>>,
) {
    let mut a_done = false;
    let mut b_done = false;
    let mut carry = Carry::None;

    let send = |result: Result<CompareResult, IngestError>| tx.send(result).is_ok();
    let one_sided = |side: Side, exec: &Execution| CompareResult::OneSided {
        side,
        result: BenchmarkCis {
            benchmark: exec.benchmark().clone(),
            cis: execution_cis(exec, ctx),
        },
    };
    let ratio = |x: &Execution, y: &Execution| {
        CompareResult::Ratio(BenchmarkRatio {
            benchmark: x.benchmark().clone(),
            cis: ratio_cis(x, y, ctx),
        })
    };

    loop {
        // With a carry, read only the other side; otherwise read both.
        let (ea, eb) = match std::mem::replace(&mut carry, Carry::None) {
            Carry::None => (next(a, a_done), next(b, b_done)),
            Carry::A(x) => (ExecutionEvent::Next(x), next(b, b_done)),
            Carry::B(x) => (next(a, a_done), ExecutionEvent::Next(x)),
        };

        use ExecutionEvent::{End, Error, Next, Start};
        match (ea, eb) {
            (Start, Start) => {}
            (Start, Next(y)) => carry = Carry::B(y),
            (Next(x), Start) => carry = Carry::A(x),
            (Start, End) => b_done = true,
            (End, Start) => a_done = true,
            (Start, Error(e)) | (Error(e), Start) => {
                if !send(Err(e)) {
                    return;
                }
            }
            (End, End) => {
                a_done = true;
                b_done = true;
            }
            (End, Next(y)) => {
                a_done = true;
                if !send(Ok(one_sided(Side::B, &y))) {
                    return;
                }
            }
            (Next(x), End) => {
                b_done = true;
                if !send(Ok(one_sided(Side::A, &x))) {
                    return;
                }
            }
            (Error(e), End) => {
                b_done = true;
                if !send(Err(e)) {
                    return;
                }
            }
            (End, Error(e)) => {
                a_done = true;
                if !send(Err(e)) {
                    return;
                }
            }
            (Error(ea), Error(eb)) => {
                if !send(Err(ea)) || !send(Err(eb)) {
                    return;
                }
            }
            (Error(e), Next(y)) => {
                // The erroring side lost its paired event; the other side's
                // execution is processed one-sided.
                if !send(Err(e)) || !send(Ok(one_sided(Side::B, &y))) {
                    return;
                }
            }
            (Next(x), Error(e)) => {
                if !send(Err(e)) || !send(Ok(one_sided(Side::A, &x))) {
                    return;
                }
            }
            (Next(x), Next(y)) => match x.benchmark().cmp(y.benchmark()) {
                Ordering::Equal => {
                    if !send(Ok(ratio(&x, &y))) {
                        return;
                    }
                }
                Ordering::Less => {
                    if !send(Ok(one_sided(Side::A, &x))) {
                        return;
                    }
                    carry = Carry::B(y);
                }
                Ordering::Greater => {
                    if !send(Ok(one_sided(Side::B, &y))) {
                        return;
                    }
                    carry = Carry::A(x);
                }
            },
        }

        if a_done && b_done {
            if !matches!(carry, Carry::None) {
                panic!("comparator terminated with an unresolved carry");
            }
            return;
        }
    }
}

/// One event from a side; a finished or disconnected side reads as `End`.
fn next(rx: &EventReceiver, done: bool) -> ExecutionEvent {
    if done {
        return ExecutionEvent::End;
    }
    rx.recv().unwrap_or(ExecutionEvent::End)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulationConfig;
    use perfdiff_bench::{FlatRecord, Sampler, Transform};

    fn execution(name: &str, value: f64) -> Box<Execution> {
        Box::new(Execution::from_record(FlatRecord {
            benchmark: Benchmark::new(name),
            instance: "i1".to_string(),
            trial: 1,
            fork: 1,
            iteration: 1,
            count: 5,
            value,
        }))
    }

    fn ctx() -> CiContext {
        CiContext {
            config: SimulationConfig {
                iterations: 20,
                max_workers: 2,
                significance_levels: vec![0.05],
            },
            statistic: perfdiff_stats::mean,
            sampler: Sampler::All,
            transform: Transform::Identity,
        }
    }

    fn stream_of(names: &[&str]) -> EventReceiver {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ExecutionEvent::Start).unwrap();
        for name in names {
            tx.send(ExecutionEvent::Next(execution(name, 1.0))).unwrap();
        }
        tx.send(ExecutionEvent::End).unwrap();
        rx
    }

    fn collect(a: EventReceiver, b: EventReceiver) -> Vec<Result<CompareResult, IngestError>> {
        compare_streams(a, b, ctx()).iter().collect()
    }

    #[test]
    fn test_empty_streams() {
        let results = collect(stream_of(&[]), stream_of(&[]));
        assert!(results.is_empty());
    }

    #[test]
    fn test_matching_streams_all_ratios_ascending() {
        let names: Vec<String> = (0..10).map(|i| format!("b{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let results = collect(stream_of(&refs), stream_of(&refs));

        assert_eq!(results.len(), 10);
        let mut seen = Vec::new();
        for r in results {
            let Ok(CompareResult::Ratio(ratio)) = r else {
                panic!("expected ratio result");
            };
            seen.push(ratio.benchmark.clone());
        }
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn test_left_only_benchmark_is_one_sided() {
        // a: b1 b2, b: b2 -> b1 one-sided A, b2 ratio.
        let results = collect(stream_of(&["b1", "b2"]), stream_of(&["b2"]));
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Ok(CompareResult::OneSided { side: Side::A, .. })
        ));
        assert!(matches!(results[1], Ok(CompareResult::Ratio(_))));
    }

    #[test]
    fn test_right_only_benchmark_is_one_sided() {
        let results = collect(stream_of(&["b2"]), stream_of(&["b1", "b2"]));
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Ok(CompareResult::OneSided { side: Side::B, .. })
        ));
        assert!(matches!(results[1], Ok(CompareResult::Ratio(_))));
    }

    #[test]
    fn test_early_end_drains_other_side() {
        let results = collect(stream_of(&[]), stream_of(&["b1", "b2", "b3"]));
        assert_eq!(results.len(), 3);
        for r in &results {
            assert!(matches!(
                r,
                Ok(CompareResult::OneSided { side: Side::B, .. })
            ));
        }
    }

    #[test]
    fn test_disjoint_streams_interleave_one_sided() {
        let results = collect(stream_of(&["a1", "c1"]), stream_of(&["b1", "d1"]));
        assert_eq!(results.len(), 4);
        let sides: Vec<Side> = results
            .iter()
            .map(|r| match r {
                Ok(CompareResult::OneSided { side, .. }) => *side,
                other => panic!("expected one-sided, got {other:?}"),
            })
            .collect();
        assert_eq!(sides, vec![Side::A, Side::B, Side::A, Side::B]);
    }

    #[test]
    fn test_error_forwarded_and_pair_processed_one_sided() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ExecutionEvent::Start).unwrap();
        tx.send(ExecutionEvent::Error(IngestError::ColumnCount {
            line: 2,
            got: 3,
        }))
        .unwrap();
        tx.send(ExecutionEvent::End).unwrap();
        drop(tx);

        let results = collect(rx, stream_of(&["b1"]));
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(matches!(
            results[1],
            Ok(CompareResult::OneSided { side: Side::B, .. })
        ));
    }
}
