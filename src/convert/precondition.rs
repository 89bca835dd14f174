//! Splitting precondition text out of topic notes.
//!
//! The generic conversion turns a topic's note into both the summary and the
//! preconditions of a test case. Authors mark where the preconditions start
//! with a tag such as `[PRECONDITIONS]`. Before conversion the note is cut at
//! the tag: the text before it stays in the note, the text after it moves to
//! the topic's `comments` side channel, from where it is re-injected into the
//! generated XML.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::instrument;

use crate::{
    domain::{Children, Document, Sheet, Topic},
    storage::{
        archive::{self, Arena, ArchiveError},
        document::{self, DocumentError},
    },
};

/// The default precondition tag.
pub const DEFAULT_MARKER: &str = "[PRECONDITIONS]";

/// A compiled precondition tag.
#[derive(Debug, Clone)]
pub struct PreconditionMarker {
    plain: Regex,
    html: Regex,
}

/// A note cut at the precondition tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteSplit<'a> {
    /// The text before the tag, trimmed.
    pub visible: &'a str,
    /// The text after the tag up to the end of the note, trimmed.
    pub precondition: &'a str,
}

impl PreconditionMarker {
    /// Compiles a tag. The tag is matched literally and case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting pattern exceeds the regex size limits.
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        let tag = regex::escape(tag);
        Ok(Self {
            plain: Regex::new(&format!(r"(?is)\s*{tag}\s*(.*)"))?,
            html: Regex::new(&format!(r"(?is)<br>{tag}.*"))?,
        })
    }

    /// Cuts a note at the first occurrence of the tag.
    ///
    /// Returns `None` if the note does not contain the tag.
    #[must_use]
    pub fn split<'a>(&self, note: &'a str) -> Option<NoteSplit<'a>> {
        let captures = self.plain.captures(note)?;
        let start = captures.get(0)?.start();
        let precondition = captures.get(1).map_or("", |m| m.as_str());
        Some(NoteSplit {
            visible: note[..start].trim(),
            precondition: precondition.trim(),
        })
    }

    /// Removes the `<br>`-prefixed tag and everything after it from an HTML
    /// note.
    #[must_use]
    pub fn strip_html(&self, html: &str) -> String {
        self.html.replace(html, "").trim().to_string()
    }
}

impl Default for PreconditionMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER).expect("the default marker is a valid pattern")
    }
}

/// The result of splitting a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument {
    /// The rewritten document.
    pub document: Document,
    /// How many topics had a precondition section.
    pub topics_split: usize,
}

/// Errors that can occur while pre-processing an archive.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// A scratch directory could not be created.
    #[error("failed to create scratch directory")]
    Scratch(#[from] std::io::Error),
    /// The archive could not be extracted or repacked.
    #[error("failed to unpack or repack the archive")]
    Archive(#[from] ArchiveError),
    /// The document could not be read or written.
    #[error("failed to rewrite the mind map document")]
    Document(#[from] DocumentError),
}

/// Moves precondition text from topic notes into the `comments` side channel.
#[derive(Debug, Clone, Default)]
pub struct PreconditionExtractor {
    marker: PreconditionMarker,
}

impl PreconditionExtractor {
    /// Creates an extractor for the given tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be compiled.
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            marker: PreconditionMarker::new(tag)?,
        })
    }

    /// Returns a copy of the document with every marked note split.
    #[must_use]
    pub fn split_document(&self, document: &Document) -> SplitDocument {
        let mut topics_split = 0;
        let document = document
            .iter()
            .map(|sheet| Sheet {
                root_topic: sheet
                    .root_topic
                    .as_ref()
                    .map(|root| self.split_topic(root, &mut topics_split)),
                extra: sheet.extra.clone(),
            })
            .collect();
        SplitDocument {
            document,
            topics_split,
        }
    }

    /// Returns a copy of the topic and its attached descendants with every
    /// marked note split.
    ///
    /// Topics without a note, or whose note has no tag, are copied unchanged.
    fn split_topic(&self, topic: &Topic, topics_split: &mut usize) -> Topic {
        let children = topic.children.as_ref().map(|children| Children {
            attached: children
                .attached
                .iter()
                .map(|child| self.split_topic(child, topics_split))
                .collect(),
            extra: children.extra.clone(),
        });

        let mut output = Topic {
            title: topic.title.clone(),
            notes: topic.notes.clone(),
            comments: topic.comments.clone(),
            children,
            markers: topic.markers.clone(),
            labels: topic.labels.clone(),
            extra: topic.extra.clone(),
        };

        let Some(split) = topic.plain_note().and_then(|note| self.marker.split(note)) else {
            return output;
        };
        *topics_split += 1;
        output.comments = Some(split.precondition.to_string());

        if split.visible.is_empty() {
            output.notes = None;
        } else if let Some(notes) = output.notes.as_mut() {
            if let Some(content) = notes.plain.as_mut().and_then(|p| p.content.as_mut()) {
                *content = split.visible.to_string();
            }
            if let Some(content) = notes.real_html.as_mut().and_then(|h| h.content.as_mut()) {
                *content = self.marker.strip_html(content);
            }
        }

        output
    }

    /// Splits the notes of an archive and writes the result to a new archive
    /// inside the arena.
    ///
    /// Returns the path of the new archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be extracted, its document cannot
    /// be decoded or written back, or the new archive cannot be packed.
    #[instrument(skip(self, arena))]
    pub fn preprocess(&self, archive_path: &Path, arena: &Arena) -> Result<PathBuf, PreprocessError> {
        let dir = arena.scratch_dir("preprocess")?;
        archive::extract(archive_path, &dir)?;

        let split = self.split_document(&document::load(&dir)?);
        document::save(&dir, &split.document)?;

        let corrected = arena.file(corrected_file_name(archive_path));
        archive::repack(&dir, &corrected)?;

        tracing::info!(topics = split.topics_split, "split precondition notes");
        Ok(corrected)
    }
}

fn corrected_file_name(archive_path: &Path) -> String {
    let stem = archive_path
        .file_stem()
        .map_or_else(|| "input".into(), |stem| stem.to_string_lossy());
    format!("{stem}_corrected.xmind")
}
