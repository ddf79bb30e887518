#![warn(missing_docs)]
//! PerfDiff Bootstrap Engine
//!
//! Stratified bootstrap resampling over execution trees:
//! - the simulation engine producing a replicate distribution and
//!   percentile confidence intervals for one execution
//! - the ratio engine pairing two matched executions' replicates
//! - stream adapters: a CI stream for one execution stream, and the
//!   two-stream comparator joining two groups by benchmark identity

mod comparator;
mod engine;
mod stream;

pub use comparator::{compare_streams, BenchmarkRatio, CompareResult, Side};
pub use engine::{
    derive_cis, execution_cis, ratio_cis, simulated_statistics, CiContext, RatioCis,
    SimulationConfig,
};
pub use stream::{ci_stream, BenchmarkCis, CiReceiver};
