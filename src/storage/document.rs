//! Reading and writing the `content.json` document of an extracted archive.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::{
    domain::Document,
    storage::archive::{self, Arena, ArchiveError},
};

/// The archive entry holding the mind-map document.
pub const CONTENT_FILE: &str = "content.json";

/// Errors that can occur when loading or saving a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The archive could not be extracted.
    #[error("failed to extract mind map archive")]
    Archive(#[from] ArchiveError),
    /// A scratch directory could not be created.
    #[error("failed to create scratch directory")]
    Scratch(#[source] io::Error),
    /// The document file could not be read or written.
    #[error("failed to access {}", path.display())]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The document is not valid JSON, or does not have the expected shape.
    #[error("failed to decode content.json")]
    Json(#[from] serde_json::Error),
}

/// Loads the document from an extracted archive directory.
///
/// # Errors
///
/// Returns an error if `content.json` is missing, unreadable, or malformed.
pub fn load(dir: &Path) -> Result<Document, DocumentError> {
    let path = dir.join(CONTENT_FILE);
    let content = fs::read(&path).map_err(|source| DocumentError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Saves the document into an extracted archive directory.
///
/// The JSON is indented by four spaces and non-ASCII text is written as UTF-8.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save(dir: &Path, document: &Document) -> Result<(), DocumentError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    document.serialize(&mut serializer)?;

    let path = dir.join(CONTENT_FILE);
    fs::write(&path, buffer).map_err(|source| DocumentError::Io { path, source })
}

/// Extracts an archive into a fresh scratch directory and loads its document.
///
/// # Errors
///
/// Returns an error if the archive cannot be extracted or its document cannot
/// be loaded.
pub fn read_archive(archive_path: &Path, arena: &Arena) -> Result<Document, DocumentError> {
    let dir = arena
        .scratch_dir("read")
        .map_err(DocumentError::Scratch)?;
    archive::extract(archive_path, &dir)?;
    load(&dir)
}
