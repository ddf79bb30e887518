//! Bootstrap Simulation Engine
//!
//! Stratified resampling over a sampler-reduced execution tree: each
//! simulation round resamples with replacement at every level (instances,
//! trials, forks, iterations, values), flattens the result, and applies the
//! statistic function to obtain one replicate. The sorted replicate
//! distribution yields percentile confidence intervals; one replicate set
//! serves every requested significance level.

use perfdiff_bench::{Execution, Sampler, Transform, ValueTree};
use perfdiff_stats::{sig_level, Ci, StatisticFn};
use rand::prelude::*;
use rand_distr::Normal;
use rayon::prelude::*;
use tracing::debug;

/// Simulation parameters shared by the bootstrap and ratio engines.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of bootstrap simulation rounds.
    pub iterations: usize,
    /// Upper bound on worker threads; the pool size is
    /// `min(iterations, max_workers)`.
    pub max_workers: usize,
    /// Significance levels to derive intervals for, sharing one replicate set.
    pub significance_levels: Vec<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            max_workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            significance_levels: vec![0.05],
        }
    }
}

/// Everything one CI computation needs besides the execution itself.
#[derive(Debug, Clone)]
pub struct CiContext {
    /// Simulation parameters.
    pub config: SimulationConfig,
    /// The statistic to bootstrap.
    pub statistic: StatisticFn,
    /// Reduction of each iteration's batches to flat values.
    pub sampler: Sampler,
    /// Value pre-transform applied to each execution.
    pub transform: Transform,
}

/// Per-side and ratio intervals from one paired bootstrap run.
#[derive(Debug, Clone)]
pub struct RatioCis {
    /// Intervals for the first (control) execution, one per level.
    pub a: Vec<Ci>,
    /// Intervals for the second (test) execution, one per level.
    pub b: Vec<Ci>,
    /// Intervals for the paired ratio B/A, one per level.
    pub ratio: Vec<Ci>,
}

/// Bootstrap one execution: returns one interval per configured
/// significance level.
pub fn execution_cis(execution: &Execution, ctx: &CiContext) -> Vec<Ci> {
    let (metric, replicates) = simulate(execution, ctx);
    derive_cis(replicates, metric, &ctx.config.significance_levels)
}

/// Bootstrap two matched executions independently and concurrently, then
/// pair replicates by index into the ratio distribution `b[i] / a[i]`.
///
/// Panics if the two replicate sets end up with different lengths; the
/// shared iteration count makes that an invariant violation, not an error.
pub fn ratio_cis(a: &Execution, b: &Execution, ctx: &CiContext) -> RatioCis {
    let ((metric_a, reps_a), (metric_b, reps_b)) =
        rayon::join(|| simulate(a, ctx), || simulate(b, ctx));

    assert_eq!(
        reps_a.len(),
        reps_b.len(),
        "simulated statistics not of same size"
    );

    let ratios: Vec<f64> = reps_a.iter().zip(&reps_b).map(|(x, y)| y / x).collect();
    let ratio_metric = (ctx.statistic)(&ratios);

    let levels = &ctx.config.significance_levels;
    RatioCis {
        a: derive_cis(reps_a, metric_a, levels),
        b: derive_cis(reps_b, metric_b, levels),
        ratio: derive_cis(ratios, ratio_metric, levels),
    }
}

/// Transform and reduce the execution, then produce the point metric and the
/// replicate set. The metric is computed over the non-resampled data,
/// concurrently with the simulation.
fn simulate(execution: &Execution, ctx: &CiContext) -> (f64, Vec<f64>) {
    let execution = ctx.transform.apply(execution);
    let tree = execution.value_tree(&ctx.sampler);
    rayon::join(
        || (ctx.statistic)(&flatten(&tree)),
        || {
            simulated_statistics(
                &tree,
                ctx.statistic,
                ctx.config.iterations,
                ctx.config.max_workers,
            )
        },
    )
}

/// Run `iterations` simulation rounds on a bounded worker pool of
/// `min(iterations, max_workers)` threads and collect the replicates.
/// Collection order is irrelevant; replicates are i.i.d. and re-sorted
/// before percentile indexing.
pub fn simulated_statistics(
    tree: &ValueTree,
    statistic: StatisticFn,
    iterations: usize,
    max_workers: usize,
) -> Vec<f64> {
    let workers = iterations.min(max_workers).max(1);
    debug!(iterations, workers, "bootstrap simulation");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .expect("bootstrap worker pool");

    pool.install(|| {
        (0..iterations)
            .into_par_iter()
            .map_init(thread_rng, |rng, _| statistic(&resample(tree, rng)))
            .collect()
    })
}

/// Sort the replicates and cut one percentile interval per significance
/// level: lower index `ceil(n * a/2)`, upper index `floor(n * (1 - a/2))`,
/// both clamped into the array.
pub fn derive_cis(mut replicates: Vec<f64>, metric: f64, levels: &[f64]) -> Vec<Ci> {
    replicates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = replicates.len();

    levels
        .iter()
        .map(|&level| {
            let sl = sig_level(level);
            if n == 0 {
                return Ci {
                    metric,
                    lower: f64::NAN,
                    upper: f64::NAN,
                    level: 1.0 - sl,
                };
            }
            let nf = n as f64;
            let lower_idx = ((nf * sl / 2.0).ceil() as usize).min(n - 1);
            let upper_idx = ((nf * (1.0 - sl / 2.0)).floor() as usize).min(n - 1);
            Ci {
                metric,
                lower: replicates[lower_idx],
                upper: replicates[upper_idx],
                level: 1.0 - sl,
            }
        })
        .collect()
}

/// One stratified resampling round over the reduced tree.
fn resample<R: Rng>(tree: &ValueTree, rng: &mut R) -> Vec<f64> {
    let mut out = Vec::new();
    for i in fold_indices(tree.len(), rng) {
        let instance = &tree[i];
        for t in fold_indices(instance.len(), rng) {
            let trial = &instance[t];
            for f in fold_indices(trial.len(), rng) {
                let fork = &trial[f];
                for it in fold_indices(fork.len(), rng) {
                    let values = &fork[it];
                    for v in fold_indices(values.len(), rng) {
                        out.push(values[v]);
                    }
                }
            }
        }
    }
    out
}

/// Draw `n` indices with replacement from `[0, n)` by fitting a normal
/// distribution to the index range (mean and sample standard deviation of
/// `0..n-1`) and folding each draw via `trunc(abs(x) mod n)`.
///
/// The fold is not a uniform distribution; it is kept for statistical
/// compatibility with existing result sets (see DESIGN.md).
fn fold_indices<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    match n {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let nf = n as f64;
            let mu = (nf - 1.0) / 2.0;
            let sigma = (nf * (nf + 1.0) / 12.0).sqrt();
            let normal = Normal::new(mu, sigma).expect("sigma is positive for n >= 2");
            (0..n)
                .map(|_| {
                    let x = normal.sample(rng);
                    (x.abs() % nf) as usize
                })
                .collect()
        }
    }
}

/// Flatten the reduced tree into one value sequence, in tree order.
pub(crate) fn flatten(tree: &ValueTree) -> Vec<f64> {
    let mut out = Vec::new();
    for instance in tree {
        for trial in instance {
            for fork in trial {
                for iteration in fork {
                    out.extend_from_slice(iteration);
                }
            }
        }
    }
    out
}
