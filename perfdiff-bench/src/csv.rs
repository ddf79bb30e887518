//! Streaming CSV Ingestion
//!
//! Reads semicolon-delimited JMH-style exports
//! (`project;commit;benchmark;params;instance;trial;fork;iteration;mode;unit;value_count;value`)
//! and emits one execution per contiguous run of rows sharing a benchmark
//! identity. Rows for one benchmark are assumed contiguous, not globally
//! sorted. Malformed rows surface as discrete error events and the stream
//! continues.

use crate::execution::{Execution, ExecutionError, FlatRecord};
use crate::stream::{CancelToken, EventReceiver, EventSender, ExecutionEvent};
use crate::{Benchmark, CSV_COLUMNS, EVENT_CHANNEL_CAPACITY};
use std::io::{BufRead, BufReader, Read};
use std::thread;
use thiserror::Error;
use tracing::debug;

/// Recoverable ingestion errors, surfaced as stream events.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// A row had the wrong number of columns.
    #[error("line {line}: expected {CSV_COLUMNS} columns, got {got}")]
    ColumnCount {
        /// 1-based line number.
        line: usize,
        /// Number of columns found.
        got: usize,
    },
    /// A numeric column failed to parse.
    #[error("line {line}: could not parse '{column}' from '{value}'")]
    Column {
        /// 1-based line number.
        line: usize,
        /// Column name.
        column: &'static str,
        /// Raw cell content.
        value: String,
    },
    /// The params column was not `k1=v1,k2=v2,...`.
    #[error("line {line}: invalid parameter list '{raw}'")]
    Params {
        /// 1-based line number.
        line: usize,
        /// Raw params cell.
        raw: String,
    },
    /// A record could not be placed into its execution.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// The underlying reader failed; the stream terminates after this event.
    #[error("read failed at line {line}: {message}")]
    Io {
        /// 1-based line number.
        line: usize,
        /// Rendered I/O error.
        message: String,
    },
}

/// Spawn a producer thread reading `reader` and emitting the tagged event
/// stream: `Start`, one `Next` per contiguous benchmark, `Error` for
/// malformed rows, then `End`.
///
/// The producer honors `cancel` at each row read and send; on cancellation it
/// stops emitting and drops the channel without `End`.
pub fn read_executions<R>(reader: R, cancel: CancelToken) -> EventReceiver
where
    R: Read + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
    thread::spawn(move || produce(reader, &tx, &cancel));
    rx
}

fn produce<R: Read>(reader: R, tx: &EventSender, cancel: &CancelToken) {
    if tx.send(ExecutionEvent::Start).is_err() {
        return;
    }

    let mut lines = BufReader::new(reader).lines();

    // Header row is required but discarded unread; a file without one is
    // treated as empty.
    match lines.next() {
        Some(Ok(_)) => {}
        Some(Err(e)) => {
            let _ = tx.send(ExecutionEvent::Error(IngestError::Io {
                line: 1,
                message: e.to_string(),
            }));
            let _ = tx.send(ExecutionEvent::End);
            return;
        }
        None => {
            let _ = tx.send(ExecutionEvent::End);
            return;
        }
    }

    let mut current: Option<Execution> = None;
    let mut line = 1usize;
    let mut emitted = 0usize;

    for read in lines {
        line += 1;
        if cancel.is_cancelled() {
            debug!(line, "ingestion cancelled");
            return;
        }

        let row = match read {
            Ok(row) => row,
            Err(e) => {
                // Reader failure is not recoverable row-by-row: report it and
                // close the stream, flushing what was accumulated.
                let _ = tx.send(ExecutionEvent::Error(IngestError::Io {
                    line,
                    message: e.to_string(),
                }));
                break;
            }
        };

        let record = match parse_row(&row, line) {
            Ok(record) => record,
            Err(e) => {
                if tx.send(ExecutionEvent::Error(e)).is_err() {
                    return;
                }
                continue;
            }
        };

        // A differing benchmark identity closes the accumulation; the row
        // starts the next one.
        if let Some(exec) = current.take() {
            if *exec.benchmark() == record.benchmark {
                current = Some(exec);
            } else {
                emitted += 1;
                if tx.send(ExecutionEvent::Next(Box::new(exec))).is_err() {
                    return;
                }
            }
        }

        match current.as_mut() {
            Some(exec) => {
                if let Err(e) = exec.add_record(record) {
                    if tx.send(ExecutionEvent::Error(e.into())).is_err() {
                        return;
                    }
                }
            }
            None => current = Some(Execution::from_record(record)),
        }
    }

    if let Some(exec) = current {
        emitted += 1;
        if tx.send(ExecutionEvent::Next(Box::new(exec))).is_err() {
            return;
        }
    }
    debug!(executions = emitted, "ingestion finished");
    let _ = tx.send(ExecutionEvent::End);
}

/// Parse one semicolon-delimited row into a flat record.
pub fn parse_row(row: &str, line: usize) -> Result<FlatRecord, IngestError> {
    let cols: Vec<&str> = row.split(';').collect();
    if cols.len() != CSV_COLUMNS {
        return Err(IngestError::ColumnCount {
            line,
            got: cols.len(),
        });
    }

    let mut benchmark = Benchmark::new(cols[2]);
    parse_params(cols[3], &mut benchmark, line)?;

    Ok(FlatRecord {
        benchmark,
        instance: cols[4].to_string(),
        trial: parse_column(cols[5], "trial", line)?,
        fork: parse_column(cols[6], "fork", line)?,
        iteration: parse_column(cols[7], "iteration", line)?,
        count: parse_column(cols[10], "value_count", line)?,
        value: parse_column(cols[11], "value", line)?,
    })
}

fn parse_column<T: std::str::FromStr>(
    cell: &str,
    column: &'static str,
    line: usize,
) -> Result<T, IngestError> {
    cell.parse().map_err(|_| IngestError::Column {
        line,
        column,
        value: cell.to_string(),
    })
}

/// Parse `k1=v1,k2=v2,...` where values may themselves contain commas.
///
/// Splitting on `=` recovers the keys: each inner segment is
/// `value,next-key`, and everything up to the segment's last comma is the
/// value.
fn parse_params(raw: &str, benchmark: &mut Benchmark, line: usize) -> Result<(), IngestError> {
    if raw.is_empty() {
        return Ok(());
    }

    let invalid = || IngestError::Params {
        line,
        raw: raw.to_string(),
    };

    let segments: Vec<&str> = raw.split('=').collect();
    if segments.len() < 2 {
        return Err(invalid());
    }

    let mut key = segments[0];
    let inner = &segments[1..];
    for (i, segment) in inner.iter().enumerate() {
        if key.is_empty() {
            return Err(invalid());
        }
        if i == inner.len() - 1 {
            benchmark.add_param(key, *segment);
        } else {
            let split = segment.rfind(',').ok_or_else(invalid)?;
            benchmark.add_param(key, &segment[..split]);
            key = &segment[split + 1..];
        }
    }
    Ok(())
}
