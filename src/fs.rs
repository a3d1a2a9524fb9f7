//! Whole-file loading for shader sources and configuration documents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::document;
use crate::error::{Error, Result};

/// Synchronous, whole-file access to assets by relative path.
///
/// The renderer never touches `std::fs` directly; everything goes through a
/// `FileSource` so tests can serve files from memory.
pub trait FileSource {
    /// Loads the file at `path` (relative to the source root) as UTF-8 text.
    fn load(&self, path: &str) -> Result<String>;
}

/// Loads and parses a configuration document from `files`.
pub fn load_document<T, F>(files: &F, path: &str) -> Result<T>
where
    T: DeserializeOwned,
    F: FileSource + ?Sized,
{
    let text = files.load(path)?;
    document::parse(&text).map_err(|err| {
        log::debug!("failed to parse '{path}': {err}");
        Error::from(err)
    })
}

/// A [`FileSource`] rooted at a directory on disk.
#[derive(Clone, Debug)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSource for DiskSource {
    fn load(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        fs::read_to_string(&full).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::missing_file(full, Some(err)),
            io::ErrorKind::InvalidData => {
                Error::InvalidUsage(format!("'{}' is not valid UTF-8", full.display()))
            }
            _ => Error::Library(format!("failed to read '{}': {err}", full.display())),
        })
    }
}

/// Joins a directory prefix and a file name with `/`, the separator used for
/// every relative asset path in the crate.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches(['/', '\\']);
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}

/// Normalizes a relative path to `/` separators without a leading `./`.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_owned()
}
