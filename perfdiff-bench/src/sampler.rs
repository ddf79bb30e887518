//! Invocation Samplers
//!
//! An iteration stores its invocations as compressed batches. A sampler
//! reduces one iteration's batches to the flat value sequence the statistics
//! operate on: full expansion, the count-weighted mean, or a weighted
//! subsample for very large invocation counts.

use crate::execution::InvocationBatch;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Reduction of one iteration's invocation batches to a flat value sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// Expand every batch: `count` copies of each value, in batch order.
    All,
    /// Reduce the iteration to its count-weighted mean.
    Mean,
    /// Draw `n` values with replacement, each batch weighted by its count.
    /// Degrades to [`Sampler::All`] when `n` covers all invocations.
    Sample(usize),
}

impl Sampler {
    /// Reduce `batches` to a flat value sequence.
    pub fn reduce(&self, batches: &[InvocationBatch]) -> Vec<f64> {
        match *self {
            Sampler::All => expand_all(batches),
            Sampler::Mean => weighted_mean(batches),
            Sampler::Sample(n) => sample_n(batches, n),
        }
    }
}

fn expand_all(batches: &[InvocationBatch]) -> Vec<f64> {
    let total: usize = batches.iter().map(|b| b.count as usize).sum();
    let mut out = Vec::with_capacity(total);
    for batch in batches {
        for _ in 0..batch.count {
            out.push(batch.value);
        }
    }
    out
}

fn weighted_mean(batches: &[InvocationBatch]) -> Vec<f64> {
    if batches.is_empty() {
        return Vec::new();
    }
    let mut total = 0u64;
    let mut sum = 0.0;
    for batch in batches {
        total += u64::from(batch.count);
        sum += f64::from(batch.count) * batch.value;
    }
    vec![sum / total as f64]
}

fn sample_n(batches: &[InvocationBatch], n: usize) -> Vec<f64> {
    let total: usize = batches.iter().map(|b| b.count as usize).sum();
    if total <= n {
        return expand_all(batches);
    }

    // total > n implies at least one positive weight, so the distribution
    // cannot fail to build.
    let dist = WeightedIndex::new(batches.iter().map(|b| b.count))
        .unwrap_or_else(|_| panic!("invocation batches have no positive count"));
    let mut rng = thread_rng();
    (0..n).map(|_| batches[dist.sample(&mut rng)].value).collect()
}
