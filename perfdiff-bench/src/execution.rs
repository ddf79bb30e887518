//! Execution Tree
//!
//! One Execution holds the full measurement hierarchy of a single benchmark:
//! instances → trials → forks → iterations → invocation batches. Executions
//! are built from flat CSV records, merged with same-benchmark executions
//! from other files, and are read-only once handed to the bootstrap engine.

use crate::ordered_map::OrderedMap;
use crate::sampler::Sampler;
use crate::Benchmark;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A run of `count` identical observed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvocationBatch {
    /// Number of identical observations, at least 1.
    pub count: u32,
    /// The observed value.
    pub value: f64,
}

/// One measurement iteration: its invocation batches in record order.
pub type Iteration = Vec<InvocationBatch>;

/// Iterations of one fork, keyed by iteration id.
pub type Fork = OrderedMap<u32, Iteration>;

/// Forks of one trial, keyed by fork id.
pub type Trial = OrderedMap<u32, Fork>;

/// Trials of one instance, keyed by trial id.
pub type Instance = OrderedMap<u32, Trial>;

/// Sampler-reduced view of an execution:
/// instances → trials → forks → iterations → values.
pub type ValueTree = Vec<Vec<Vec<Vec<Vec<f64>>>>>;

/// One CSV row worth of measurements, not yet placed in a tree.
#[derive(Debug, Clone)]
pub struct FlatRecord {
    /// Benchmark this record belongs to.
    pub benchmark: Benchmark,
    /// Instance (machine/environment) identifier.
    pub instance: String,
    /// Trial number.
    pub trial: u32,
    /// Fork number within the trial.
    pub fork: u32,
    /// Iteration number within the fork.
    pub iteration: u32,
    /// Number of identical observations.
    pub count: u32,
    /// Observed value.
    pub value: f64,
}

/// Errors from building or merging executions.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// A record or merge source belongs to a different benchmark.
    #[error("execution belongs to {expected}, not {got}")]
    BenchmarkMismatch {
        /// Benchmark the execution was created for.
        expected: String,
        /// Benchmark of the offending record or execution.
        got: String,
    },
}

/// Full measurement tree for one benchmark identity.
///
/// The running invocation count is atomic: it is bumped by concurrent
/// producers during ingestion and merge, while the tree itself follows a
/// single-writer-at-a-time discipline.
#[derive(Debug)]
pub struct Execution {
    benchmark: Benchmark,
    instances: OrderedMap<String, Instance>,
    invocations: AtomicU64,
}

impl Clone for Execution {
    fn clone(&self) -> Self {
        Self {
            benchmark: self.benchmark.clone(),
            instances: self.instances.clone(),
            invocations: AtomicU64::new(self.invocations.load(Ordering::Relaxed)),
        }
    }
}

impl Execution {
    /// Create an empty execution for `benchmark`.
    pub fn new(benchmark: Benchmark) -> Self {
        Self {
            benchmark,
            instances: OrderedMap::new(),
            invocations: AtomicU64::new(0),
        }
    }

    /// Create an execution holding a single flat record.
    pub fn from_record(record: FlatRecord) -> Self {
        let mut e = Self::new(record.benchmark.clone());
        // Cannot fail: the execution was just created for this benchmark.
        let _ = e.add_record(record);
        e
    }

    /// The benchmark this execution measures.
    pub fn benchmark(&self) -> &Benchmark {
        &self.benchmark
    }

    /// Instances in insertion order.
    pub fn instances(&self) -> &OrderedMap<String, Instance> {
        &self.instances
    }

    /// Total number of invocations across the whole tree.
    pub fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Place one flat record into the tree.
    pub fn add_record(&mut self, record: FlatRecord) -> Result<(), ExecutionError> {
        if record.benchmark != self.benchmark {
            return Err(ExecutionError::BenchmarkMismatch {
                expected: self.benchmark.to_string(),
                got: record.benchmark.to_string(),
            });
        }

        self.instances
            .get_or_insert_with(record.instance, OrderedMap::new)
            .get_or_insert_with(record.trial, OrderedMap::new)
            .get_or_insert_with(record.fork, OrderedMap::new)
            .get_or_insert_with(record.iteration, Vec::new)
            .push(InvocationBatch {
                count: record.count,
                value: record.value,
            });
        self.invocations
            .fetch_add(u64::from(record.count), Ordering::Relaxed);
        Ok(())
    }

    /// Merge a same-benchmark execution into this one.
    ///
    /// Recurses level by level: a key present on both sides merges
    /// recursively, a new key is adopted whole. The resulting invocation
    /// count is the sum of both sides' counts.
    pub fn merge(&mut self, other: Execution) -> Result<(), ExecutionError> {
        if other.benchmark != self.benchmark {
            return Err(ExecutionError::BenchmarkMismatch {
                expected: self.benchmark.to_string(),
                got: other.benchmark.to_string(),
            });
        }

        let added = other.invocation_count();
        for (id, instance) in other.instances.into_entries() {
            match self.instances.get_mut(&id) {
                Some(existing) => merge_instances(existing, instance),
                None => {
                    self.instances.insert(id, instance);
                }
            }
        }
        self.invocations.fetch_add(added, Ordering::Relaxed);
        Ok(())
    }

    /// Reduce the tree with `sampler`, keeping the level structure.
    pub fn value_tree(&self, sampler: &Sampler) -> ValueTree {
        self.instances
            .values()
            .map(|instance| {
                instance
                    .values()
                    .map(|trial| {
                        trial
                            .values()
                            .map(|fork| {
                                fork.values()
                                    .map(|iteration| sampler.reduce(iteration))
                                    .collect()
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Copy the tree with every invocation value mapped through `f`.
    /// Batch counts and the total invocation count are unchanged.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Execution {
        let mut out = Execution::new(self.benchmark.clone());
        for (iid, instance) in self.instances.iter() {
            let new_instance = out
                .instances
                .get_or_insert_with(iid.clone(), OrderedMap::new);
            for (tid, trial) in instance.iter() {
                let new_trial = new_instance.get_or_insert_with(*tid, OrderedMap::new);
                for (fid, fork) in trial.iter() {
                    let new_fork = new_trial.get_or_insert_with(*fid, OrderedMap::new);
                    for (itid, iteration) in fork.iter() {
                        let new_iteration = new_fork.get_or_insert_with(*itid, Vec::new);
                        for batch in iteration {
                            new_iteration.push(InvocationBatch {
                                count: batch.count,
                                value: f(batch.value),
                            });
                        }
                    }
                }
            }
        }
        out.invocations
            .store(self.invocation_count(), Ordering::Relaxed);
        out
    }
}

fn merge_instances(into: &mut Instance, from: Instance) {
    for (tid, trial) in from.into_entries() {
        match into.get_mut(&tid) {
            Some(existing) => merge_trials(existing, trial),
            None => {
                into.insert(tid, trial);
            }
        }
    }
}

fn merge_trials(into: &mut Trial, from: Trial) {
    for (fid, fork) in from.into_entries() {
        match into.get_mut(&fid) {
            Some(existing) => merge_forks(existing, fork),
            None => {
                into.insert(fid, fork);
            }
        }
    }
}

fn merge_forks(into: &mut Fork, from: Fork) {
    for (itid, iteration) in from.into_entries() {
        match into.get_mut(&itid) {
            Some(existing) => existing.extend(iteration),
            None => {
                into.insert(itid, iteration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(b: &Benchmark, iteration: u32, count: u32, value: f64) -> FlatRecord {
        FlatRecord {
            benchmark: b.clone(),
            instance: "i1".to_string(),
            trial: 1,
            fork: 1,
            iteration,
            count,
            value,
        }
    }

    #[test]
    fn test_two_records_two_iterations() {
        let b = Benchmark::new("b1");
        let mut e = Execution::from_record(record(&b, 1, 1, 0.0));
        e.add_record(record(&b, 2, 1, 1.0)).unwrap();

        assert_eq!(e.instances().len(), 1);
        let instance = e.instances().value_at(0);
        assert_eq!(instance.len(), 1);
        let trial = instance.value_at(0);
        assert_eq!(trial.len(), 1);
        let fork = trial.value_at(0);
        assert_eq!(fork.len(), 2);
        assert_eq!(fork.value_at(0).len(), 1);
        assert_eq!(fork.value_at(1).len(), 1);
        assert_eq!(e.invocation_count(), 2);
    }

    #[test]
    fn test_add_record_rejects_foreign_benchmark() {
        let mut e = Execution::new(Benchmark::new("b1"));
        let err = e.add_record(record(&Benchmark::new("b2"), 1, 1, 0.0));
        assert!(matches!(
            err,
            Err(ExecutionError::BenchmarkMismatch { .. })
        ));
        assert_eq!(e.invocation_count(), 0);
    }

    #[test]
    fn test_merge_counts_additive() {
        let b = Benchmark::new("b1");
        let mut e1 = Execution::from_record(record(&b, 1, 10, 1.0));
        let e2 = Execution::from_record(record(&b, 2, 5, 2.0));

        e1.merge(e2).unwrap();
        assert_eq!(e1.invocation_count(), 15);
    }

    #[test]
    fn test_merge_same_iteration_concatenates_batches() {
        let b = Benchmark::new("b1");
        let mut e1 = Execution::from_record(record(&b, 1, 1, 1.0));
        let e2 = Execution::from_record(record(&b, 1, 1, 2.0));

        e1.merge(e2).unwrap();
        let fork = e1.instances().value_at(0).value_at(0).value_at(0);
        assert_eq!(fork.len(), 1);
        assert_eq!(
            fork.value_at(0),
            &vec![
                InvocationBatch { count: 1, value: 1.0 },
                InvocationBatch { count: 1, value: 2.0 }
            ]
        );
    }

    #[test]
    fn test_merge_rejects_foreign_benchmark() {
        let mut e1 = Execution::new(Benchmark::new("b1"));
        let e2 = Execution::new(Benchmark::new("b2"));
        assert!(e1.merge(e2).is_err());
    }

    #[test]
    fn test_split_merge_reproduces_unsplit_tree() {
        let b = Benchmark::new("b1");
        let records: Vec<FlatRecord> = (1..=4)
            .map(|i| record(&b, i, 2, f64::from(i)))
            .collect();

        // One execution from all records.
        let mut whole = Execution::new(b.clone());
        for r in &records {
            whole.add_record(r.clone()).unwrap();
        }

        // Split across two executions, merged in reverse order.
        let mut left = Execution::new(b.clone());
        left.add_record(records[2].clone()).unwrap();
        left.add_record(records[3].clone()).unwrap();
        let mut right = Execution::new(b.clone());
        right.add_record(records[0].clone()).unwrap();
        right.add_record(records[1].clone()).unwrap();
        right.merge(left).unwrap();

        assert_eq!(whole.invocation_count(), right.invocation_count());
        let sampler = Sampler::All;
        assert_eq!(whole.value_tree(&sampler), right.value_tree(&sampler));
    }

    #[test]
    fn test_map_values() {
        let b = Benchmark::new("b1");
        let e = Execution::from_record(record(&b, 1, 3, 2.0));
        let doubled = e.map_values(|v| v * 2.0);

        assert_eq!(doubled.invocation_count(), 3);
        assert_eq!(doubled.value_tree(&Sampler::All)[0][0][0][0], vec![4.0; 3]);
        // Input untouched.
        assert_eq!(e.value_tree(&Sampler::All)[0][0][0][0], vec![2.0; 3]);
    }
}
