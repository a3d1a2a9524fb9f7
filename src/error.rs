//! Error kinds shared by every subsystem of the renderer.
//!
//! Every fallible operation returns [`Result<T>`], whose error is a single
//! [`Error`] enum. Each variant belongs to exactly one [`ErrorKind`], and the
//! kind has a stable string form used in fatal log lines:
//!
//! ```ignore
//! if let Err(err) = Renderer::boot(gpu, &config, files, feed) {
//!     log::error!("failed to create renderer: {err}: {}", err.kind());
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::document::ParseError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OutOfMemory,
    MissingFile,
    LibraryFailure,
    InvalidUsage,
    FailedParse,
    InvalidShader,
    Unimplemented,
    CyclicRenderGraph,
    NoSuitableHardware,
}

impl ErrorKind {
    /// Stable upper-case name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::OutOfMemory => "NO_MEM",
            ErrorKind::MissingFile => "NO_FILE",
            ErrorKind::LibraryFailure => "LIBRARY_FAILURE",
            ErrorKind::InvalidUsage => "INVALID_USAGE",
            ErrorKind::FailedParse => "FAILED_PARSE",
            ErrorKind::InvalidShader => "INVALID_SHADER",
            ErrorKind::Unimplemented => "UNIMPLEMENTED_FUNCTIONALITY",
            ErrorKind::CyclicRenderGraph => "CYCLICAL_RENDER_GRAPH",
            ErrorKind::NoSuitableHardware => "NO_SUITABLE_HARDWARE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document a loading error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Technique,
    Effect,
    Material,
    Config,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::Technique => "technique",
            EntryKind::Effect => "effect",
            EntryKind::Material => "material",
            EntryKind::Config => "config",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("missing file '{}'", path.display())]
    MissingFile {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("library failure: {0}")]
    Library(String),

    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{kind} '{entry}': {reason}")]
    Entry {
        kind: EntryKind,
        entry: String,
        reason: String,
    },

    #[error("invalid shader '{name}':\n{diagnostics}")]
    InvalidShader { name: String, diagnostics: String },

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("cyclic render graph: pass '{pass}' is reachable from itself")]
    CyclicRenderGraph { pass: String },

    #[error("no suitable hardware: {0}")]
    NoSuitableHardware(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Error::MissingFile { .. } => ErrorKind::MissingFile,
            Error::Library(_) => ErrorKind::LibraryFailure,
            Error::InvalidUsage(_) => ErrorKind::InvalidUsage,
            Error::Parse(_) | Error::Entry { .. } => ErrorKind::FailedParse,
            Error::InvalidShader { .. } => ErrorKind::InvalidShader,
            Error::Unimplemented(_) => ErrorKind::Unimplemented,
            Error::CyclicRenderGraph { .. } => ErrorKind::CyclicRenderGraph,
            Error::NoSuitableHardware(_) => ErrorKind::NoSuitableHardware,
        }
    }

    pub(crate) fn entry(kind: EntryKind, entry: &str, reason: impl Into<String>) -> Self {
        Error::Entry {
            kind,
            entry: entry.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_file(path: impl Into<PathBuf>, source: Option<std::io::Error>) -> Self {
        Error::MissingFile {
            path: path.into(),
            source,
        }
    }
}

impl From<wgpu::Error> for Error {
    fn from(err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => Error::OutOfMemory(err.to_string()),
            other => Error::Library(other.to_string()),
        }
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        match err.kind {
            notify::ErrorKind::PathNotFound => Error::missing_file(
                err.paths.first().cloned().unwrap_or_default(),
                None,
            ),
            _ => Error::Library(err.to_string()),
        }
    }
}
