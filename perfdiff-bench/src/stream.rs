//! Tagged Event Streams
//!
//! Pipeline stages are linked by channels carrying a tagged event stream:
//! `Start` exactly once, zero or more `Next`/`Error` events, then `End`
//! exactly once. Receivers treat a disconnected channel as termination; a
//! cancelled producer may drop the sender without emitting `End`.

use crate::csv::IngestError;
use crate::execution::Execution;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One event of an execution stream.
#[derive(Debug)]
pub enum ExecutionEvent {
    /// Stream opened. Emitted exactly once, first.
    Start,
    /// One benchmark's accumulated execution.
    Next(Box<Execution>),
    /// A recoverable mid-stream error; the stream continues.
    Error(IngestError),
    /// Stream exhausted. Emitted exactly once, last.
    End,
}

/// Sending half of an execution stream.
pub type EventSender = Sender<ExecutionEvent>;

/// Receiving half of an execution stream.
pub type EventReceiver = Receiver<ExecutionEvent>;

/// Cooperative cancellation flag shared between a pipeline driver and its
/// producer threads. Producers check it at each suspension point and stop
/// emitting without any flush guarantee for buffered events.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());
    }
}
