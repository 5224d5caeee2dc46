//! Shared types passed between the rewriter and the snapshot writer.

use std::path::PathBuf;

/// One file to be written under the output root.
///
/// Produced by the rewriter (relocated resources) and by the snapshot writer
/// itself (pages and bundles); only the snapshot writer ever writes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    /// Destination, relative to the output root.
    pub path: PathBuf,
    pub content: EntryContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Bytes already in memory.
    Inline(Vec<u8>),
    /// Byte-for-byte copy of an existing file.
    CopyFrom(PathBuf),
}

impl OutputEntry {
    pub fn inline(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::Inline(bytes.into()),
        }
    }

    pub fn copy(source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::CopyFrom(source.into()),
        }
    }
}
