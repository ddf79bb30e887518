#![warn(missing_docs)]
//! PerfDiff Benchmark Data Model
//!
//! Provides the measurement hierarchy for JMH-style benchmark results and the
//! streaming pipeline that feeds it:
//! - Benchmark identity with a total order over name and parameters
//! - The Execution tree (instances, trials, forks, iterations, invocations)
//! - Invocation samplers reducing an iteration to a flat value sequence
//! - Whole-execution value transformers
//! - Streaming CSV ingestion and the k-way stream merger

mod benchmark;
mod csv;
mod execution;
mod merger;
mod ordered_map;
mod sampler;
mod stream;
mod transform;

pub use benchmark::Benchmark;
pub use csv::{parse_row, read_executions, IngestError};
pub use execution::{
    Execution, ExecutionError, FlatRecord, Fork, Instance, InvocationBatch, Iteration, Trial,
    ValueTree,
};
pub use merger::merge_streams;
pub use ordered_map::OrderedMap;
pub use sampler::Sampler;
pub use stream::{CancelToken, EventReceiver, EventSender, ExecutionEvent};
pub use transform::Transform;

/// Number of columns in a JMH-style CSV export.
pub const CSV_COLUMNS: usize = 12;

/// Capacity of the event channels linking pipeline stages.
///
/// Small on purpose: producers block on downstream readiness instead of
/// buffering unbounded files in memory.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;
