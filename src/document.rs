//! Configuration documents in [RON](https://github.com/ron-rs/ron).
//!
//! Techniques, effects and materials are each declared in a document whose
//! root is a map from entry name to entry:
//!
//! ```text
//! // techs.ron
//! {
//!     "tri": (vert: "mesh.vert.wgsl", frag: "mesh.frag.wgsl"),
//!     "flat": (vert: "mesh.vert.wgsl", frag: "flat.frag.wgsl", cull: false),
//! }
//! ```
//!
//! Documents are read with the `implicit_some` extension, so optional keys
//! take a bare value instead of `Some(..)`. A [`Table`] keeps its entries in
//! file order.

use std::fmt;
use std::marker::PhantomData;

use ron::extensions::Extensions;
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// A syntax or type error with the position it was detected at (1-based).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<ron::error::SpannedError> for ParseError {
    fn from(err: ron::error::SpannedError) -> Self {
        Self {
            message: err.code.to_string(),
            line: err.span.start.line,
            column: err.span.start.col,
        }
    }
}

/// Parses a document into `T`.
pub fn parse<T: DeserializeOwned>(source: &str) -> Result<T, ParseError> {
    ron::Options::default()
        .with_default_extension(Extensions::IMPLICIT_SOME)
        .from_str(source)
        .map_err(ParseError::from)
}

/// Named entries in the order they appear in the source.
///
/// Loading stops at the first bad entry and keeps everything before it, so
/// unlike a hash map the order here is observable.
#[derive(Clone, Debug, PartialEq)]
pub struct Table<T> {
    entries: Vec<(String, T)>,
}

impl<T> Table<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> FromIterator<(String, T)> for Table<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for TableVisitor<T> {
            type Value = Table<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of named entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Table<T>, A::Error> {
                let mut entries: Vec<(String, T)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, entry)) = map.next_entry::<String, T>()? {
                    if entries.iter().any(|(key, _)| *key == name) {
                        return Err(de::Error::custom(format!("duplicate entry '{name}'")));
                    }
                    entries.push((name, entry));
                }
                Ok(Table { entries })
            }
        }

        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}
