//! Absolute paths in the store's mutable namespace.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// A normalized absolute path such as `/k3j9x2/src/main.rs`.
///
/// Segments are never empty, `.` or `..`, and never contain `/`. The root is
/// the path with no segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The namespace root, `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path. Leading, trailing, and repeated slashes
    /// are tolerated.
    pub fn parse(path: &str) -> StoreResult<Self> {
        let mut out = Self::root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            out.push(segment).map_err(|_| StoreError::InvalidPath {
                path: path.to_string(),
                reason: format!("invalid segment {segment:?}"),
            })?;
        }
        Ok(out)
    }

    /// Append a single segment.
    pub fn push(&mut self, segment: &str) -> StoreResult<()> {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
            return Err(StoreError::InvalidPath {
                path: self.to_string(),
                reason: format!("invalid segment {segment:?}"),
            });
        }
        self.segments.push(segment.to_string());
        Ok(())
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: &str) -> StoreResult<Self> {
        let mut out = self.clone();
        out.push(segment)?;
        Ok(out)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into parent path and final segment. `None` for the root.
    pub fn split_last(&self) -> Option<(StorePath, &str)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            StorePath {
                segments: rest.to_vec(),
            },
            last.as_str(),
        ))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
