//! Input sources: one hostname per line.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::UnreadablePolicy;

/// Errors raised while opening input sources.
#[derive(Debug, Error)]
pub enum InputError {
    /// A path could not be opened and the policy is `abort`.
    #[error("Failed to open input {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every path failed to open, or none was given.
    #[error("No usable input sources ({attempted} given)")]
    NoUsableSources { attempted: usize },
}

/// A named line-oriented reader handed to one producer thread.
pub struct InputSource {
    name: String,
    reader: Box<dyn BufRead + Send>,
}

impl InputSource {
    /// Open a file for buffered reading.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(path.display().to_string(), BufReader::new(file)))
    }

    /// Wrap any buffered reader, e.g. an in-memory cursor in tests.
    pub fn from_reader(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn BufRead + Send>) {
        (self.name, self.reader)
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSource").field("name", &self.name).finish()
    }
}

/// Result of opening a list of input paths.
#[derive(Debug)]
pub struct OpenedSources {
    pub sources: Vec<InputSource>,
    /// Paths that could not be opened and were skipped.
    pub skipped: Vec<PathBuf>,
}

/// Open every path according to `policy`.
///
/// With [`UnreadablePolicy::Skip`] unreadable paths are logged and left out;
/// the call only fails when no source at all could be opened.
pub fn open_sources(
    paths: &[PathBuf],
    policy: UnreadablePolicy,
) -> Result<OpenedSources, InputError> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        match InputSource::open(path) {
            Ok(source) => {
                info!("Opened input {:?}", path);
                sources.push(source);
            }
            Err(source) => match policy {
                UnreadablePolicy::Abort => {
                    return Err(InputError::Open {
                        path: path.clone(),
                        source,
                    });
                }
                UnreadablePolicy::Skip => {
                    warn!("Skipping input {:?}: {}", path, source);
                    skipped.push(path.clone());
                }
            },
        }
    }

    if sources.is_empty() {
        return Err(InputError::NoUsableSources {
            attempted: paths.len(),
        });
    }

    Ok(OpenedSources { sources, skipped })
}
