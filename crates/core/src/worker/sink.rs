//! The shared output file.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Line-oriented output shared by all resolver threads.
///
/// Has its own lock, unrelated to the queue lock. Each record is written as
/// a whole line while the lock is held, so lines never interleave.
pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
    records: AtomicU64,
}

impl OutputSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            records: AtomicU64::new(0),
        }
    }

    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Append `"<item>, <address>"`, leaving the address empty when the
    /// lookup failed.
    pub fn write_record(&self, item: &str, address: Option<IpAddr>) -> io::Result<()> {
        let line = format_record(item, address);
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        drop(writer);

        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    pub fn records_written(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("records", &self.records_written())
            .finish_non_exhaustive()
    }
}

/// Format one output line, including the trailing newline.
pub fn format_record(item: &str, address: Option<IpAddr>) -> String {
    match address {
        Some(addr) => format!("{}, {}\n", item, addr),
        None => format!("{}, \n", item),
    }
}
