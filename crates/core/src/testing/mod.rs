//! Testing utilities and mock implementations.
//!
//! This module provides a controllable resolver and an in-memory output
//! buffer, allowing full orchestrator runs without network access or files.
//!
//! # Example
//!
//! ```rust,ignore
//! use multilookup_core::testing::{MockResolver, SharedBuffer};
//!
//! let resolver = MockResolver::new().with_address("alpha", [10, 0, 0, 1]);
//! let buffer = SharedBuffer::new();
//! let sink = OutputSink::new(buffer.clone());
//!
//! // Run the orchestrator, then inspect buffer.lines()
//! ```

mod mock_resolver;

pub use mock_resolver::MockResolver;

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Cloneable in-memory writer. All clones share one buffer, so a test can
/// keep a handle while the sink owns another.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Written lines without their terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Cursor;

    use crate::input::InputSource;

    /// An in-memory input source with one entry per line.
    pub fn source_from_lines(name: &str, lines: &[&str]) -> InputSource {
        let mut text = lines.join("\n");
        text.push('\n');
        InputSource::from_reader(name, Cursor::new(text))
    }

    /// An in-memory input source with the given raw contents.
    pub fn source_from_text(name: &str, text: &str) -> InputSource {
        InputSource::from_reader(name, Cursor::new(text.to_string()))
    }

    /// Host names `"<prefix><n>.example"` for `n` in `0..count`.
    pub fn hostnames(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|n| format!("{prefix}{n}.example")).collect()
    }
}
