//! Producer worker: reads one input source into the work queue.

use std::io::{self, BufRead, ErrorKind, Read};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::input::InputSource;
use crate::queue::{PushError, WorkQueue};

/// Errors that end a single producer early.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Failed to read from {source_name}: {source}")]
    Read {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to enqueue item from {source_name}: {source}")]
    Push {
        source_name: String,
        #[source]
        source: PushError,
    },
}

/// What one producer contributed to the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub source: String,
    pub items_enqueued: u64,
    /// Lines that were empty once the terminator was removed.
    pub blank_lines: u64,
    /// Lines longer than the configured maximum hostname length.
    pub oversized_lines: u64,
    /// The run was cancelled before the source was exhausted.
    pub stopped_early: bool,
}

/// Reads lines from one source and pushes them onto the shared queue.
pub struct Producer<'a> {
    id: usize,
    queue: &'a WorkQueue,
    max_name_length: usize,
}

impl<'a> Producer<'a> {
    pub fn new(id: usize, queue: &'a WorkQueue, max_name_length: usize) -> Self {
        Self {
            id,
            queue,
            max_name_length,
        }
    }

    /// Drain `source` into the queue until end of input.
    ///
    /// Blocks while the queue is full. Every non-blank line is either
    /// enqueued or the call returns an error.
    pub fn run(&self, source: InputSource) -> Result<ProducerReport, ProducerError> {
        let (name, mut reader) = source.into_parts();
        let mut report = ProducerReport {
            source: name,
            ..Default::default()
        };
        let mut buf = Vec::new();
        // Longest raw line that can still hold an accepted name plus "\r\n"
        let window = self.max_name_length as u64 + 2;

        debug!("Producer {} reading {}", self.id, report.source);

        loop {
            buf.clear();
            let read_error = |source| ProducerError::Read {
                source_name: report.source.clone(),
                source,
            };

            let read = (&mut reader)
                .take(window)
                .read_until(b'\n', &mut buf)
                .map_err(read_error)?;
            if read == 0 {
                break;
            }

            let truncated = read as u64 == window && buf.last() != Some(&b'\n');
            if truncated {
                let skipped = skip_to_newline(&mut reader).map_err(read_error)?;
                warn!(
                    "Skipping line of {}+ bytes in {} (limit {})",
                    buf.len() as u64 + skipped,
                    report.source,
                    self.max_name_length
                );
                report.oversized_lines += 1;
                continue;
            }

            let raw = strip_line_terminator(&buf);
            if raw.is_empty() {
                report.blank_lines += 1;
                continue;
            }
            if raw.len() > self.max_name_length {
                warn!(
                    "Skipping {}-byte line in {} (limit {})",
                    raw.len(),
                    report.source,
                    self.max_name_length
                );
                report.oversized_lines += 1;
                continue;
            }

            let item = String::from_utf8_lossy(raw);
            match self.queue.push(item.to_string()) {
                Ok(()) => report.items_enqueued += 1,
                Err(PushError::Cancelled(item)) => {
                    info!(
                        "Producer {} stopping, run cancelled (next item {:?})",
                        self.id, item
                    );
                    report.stopped_early = true;
                    break;
                }
                Err(source) => {
                    return Err(ProducerError::Push {
                        source_name: report.source.clone(),
                        source,
                    });
                }
            }
        }

        debug!(
            "Producer {} finished {}: {} enqueued, {} blank",
            self.id, report.source, report.items_enqueued, report.blank_lines
        );
        Ok(report)
    }
}

/// Remove one trailing `\n` or `\r\n`.
pub fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Discard input up to and including the next `\n`, without buffering it.
/// Returns the number of bytes dropped.
fn skip_to_newline(reader: &mut impl BufRead) -> io::Result<u64> {
    let mut skipped = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(skipped);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(skipped + end as u64 + 1);
            }
            None => {
                let len = available.len();
                reader.consume(len);
                skipped += len as u64;
            }
        }
    }
}
