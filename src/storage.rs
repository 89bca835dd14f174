pub mod archive;
pub mod document;

pub use archive::{Arena, ArchiveError};
pub use document::{DocumentError, CONTENT_FILE};
