//! Re-injecting preserved preconditions into generated TestLink XML.
//!
//! The generic conversion fills `<preconditions>` from the whole note. After
//! pre-processing, the real precondition text lives in the `comments` side
//! channel of the corresponding topic. This stage rebuilds a title to
//! precondition map from the pre-processed archive and overwrites the
//! `<preconditions>` of every test case with a matching name.
//!
//! Matching is by name, so titles carrying preconditions must be unique.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use quick_xml::{
    Reader, Writer,
    events::{BytesStart, BytesText, Event, attributes::AttrError},
};
use tracing::instrument;

use crate::{
    convert::testlink::{PRECONDITIONS, TESTCASE, TESTSUITE},
    domain::{Document, Topic},
    storage::{
        archive::Arena,
        document::{self, DocumentError},
    },
};

/// Preserved precondition text, keyed by topic title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsMap {
    entries: BTreeMap<String, String>,
}

impl CommentsMap {
    /// Collects the `comments` side channel of every attached topic that has a
    /// title.
    ///
    /// # Errors
    ///
    /// Returns [`ReinjectError::DuplicateTitle`] if two topics with the same
    /// title both carry preconditions.
    pub fn collect(document: &Document) -> Result<Self, ReinjectError> {
        let mut entries = BTreeMap::new();
        let topics = document
            .iter()
            .filter_map(|sheet| sheet.root_topic.as_ref())
            .flat_map(Topic::walk);

        for topic in topics {
            let (Some(title), Some(comments)) = (&topic.title, &topic.comments) else {
                continue;
            };
            if entries.insert(title.clone(), comments.clone()).is_some() {
                return Err(ReinjectError::DuplicateTitle(title.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// Looks up the preconditions for a title.
    #[must_use]
    pub fn get(&self, title: &str) -> Option<&str> {
        self.entries.get(title).map(String::as_str)
    }

    /// The number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no topic carries preconditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CommentsMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Errors that can occur while re-injecting preconditions.
#[derive(Debug, thiserror::Error)]
pub enum ReinjectError {
    /// The pre-processed archive could not be read.
    #[error("failed to read the pre-processed mind map")]
    Document(#[from] DocumentError),
    /// More than one topic or test case has this name, so it is ambiguous
    /// which one the preconditions belong to.
    #[error("the title {0:?} is used by more than one test case")]
    DuplicateTitle(String),
    /// A file could not be read, written or moved.
    #[error("failed to access {}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The generated XML could not be written back.
    #[error("failed to write TestLink XML")]
    Write(#[from] io::Error),
    /// The generated XML is not well-formed.
    #[error("malformed TestLink XML")]
    Xml(#[from] quick_xml::Error),
    /// The generated XML has a malformed attribute.
    #[error("malformed TestLink XML")]
    Attribute(#[from] AttrError),
    /// An attribute value contains an invalid escape sequence.
    #[error("malformed TestLink XML")]
    Escape(#[from] quick_xml::escape::EscapeError),
}

/// XML with preconditions injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injected {
    /// The rewritten document.
    pub xml: Vec<u8>,
    /// How many `<preconditions>` elements were overwritten.
    pub replaced: usize,
}

/// Rebuilds the comments map from a pre-processed archive.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, or if titles carrying
/// preconditions are not unique.
#[instrument(skip(arena))]
pub fn comments_from_archive(archive_path: &Path, arena: &Arena) -> Result<CommentsMap, ReinjectError> {
    let comments = CommentsMap::collect(&document::read_archive(archive_path, arena)?)?;
    tracing::debug!(entries = comments.len(), "collected preserved preconditions");
    Ok(comments)
}

/// Writes the final XML.
///
/// With an empty map the generated file is moved to `final_xml` unchanged.
/// Otherwise the preconditions are injected and the result is written to
/// `final_xml`. Nothing is written if the generated XML cannot be parsed.
///
/// Returns the number of `<preconditions>` elements overwritten.
///
/// # Errors
///
/// Returns an error if a file cannot be accessed, the generated XML is
/// malformed, or two matching test cases share a name.
#[instrument(skip(comments))]
pub fn reinject(
    generated_xml: &Path,
    comments: &CommentsMap,
    final_xml: &Path,
) -> Result<usize, ReinjectError> {
    if comments.is_empty() {
        move_file(generated_xml, final_xml)?;
        tracing::debug!("no preserved preconditions; output moved unchanged");
        return Ok(0);
    }

    let xml = fs::read_to_string(generated_xml).map_err(|source| ReinjectError::Io {
        path: generated_xml.to_path_buf(),
        source,
    })?;
    let injected = inject(&xml, comments)?;
    fs::write(final_xml, &injected.xml).map_err(|source| ReinjectError::Io {
        path: final_xml.to_path_buf(),
        source,
    })?;

    tracing::info!(replaced = injected.replaced, "re-injected preconditions");
    Ok(injected.replaced)
}

fn move_file(from: &Path, to: &Path) -> Result<(), ReinjectError> {
    let io_error = |source| ReinjectError::Io {
        path: to.to_path_buf(),
        source,
    };
    if fs::rename(from, to).is_err() {
        // Renaming fails across filesystems.
        fs::copy(from, to).map_err(io_error)?;
        fs::remove_file(from).map_err(io_error)?;
    }
    Ok(())
}

/// Overwrites the preconditions of matching test cases.
///
/// Only `testcase` elements that are children of a `testsuite` below the root
/// `testsuite` are considered. For each one whose `name` is in the map, the
/// content of its first `preconditions` child is replaced with the preserved
/// text. Test cases without a `preconditions` element are left alone, as is
/// everything else in the document.
///
/// # Errors
///
/// Returns an error if the XML is malformed, or if more than one matching
/// test case has the same name.
pub fn inject(xml: &str, comments: &CommentsMap) -> Result<Injected, ReinjectError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut pending: Option<&str> = None;
    let mut replaced = 0;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Start(start) => {
                path.push(start.name().as_ref().to_vec());
                if is_testcase(&path) {
                    pending = match_testcase(start, comments, &mut seen)?;
                } else if is_preconditions(&path) {
                    if let Some(text) = pending.take() {
                        writer.write_event(Event::Start(start.clone()))?;
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                        reader.read_to_end(start.name())?;
                        writer.write_event(Event::End(start.to_end()))?;
                        path.pop();
                        replaced += 1;
                        continue;
                    }
                }
            }
            Event::Empty(empty) => {
                if is_testcase(&path) && empty.name().as_ref() == PRECONDITIONS.as_bytes() {
                    if let Some(text) = pending.take() {
                        writer.write_event(Event::Start(empty.clone()))?;
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                        writer.write_event(Event::End(empty.to_end()))?;
                        replaced += 1;
                        continue;
                    }
                }
            }
            Event::End(_) => {
                if is_testcase(&path) {
                    pending = None;
                }
                path.pop();
            }
            _ => {}
        }
        writer.write_event(event)?;
    }

    Ok(Injected {
        xml: writer.into_inner(),
        replaced,
    })
}

fn is_testcase(path: &[Vec<u8>]) -> bool {
    matches!(path, [root, suite, case]
        if root == TESTSUITE.as_bytes()
            && suite == TESTSUITE.as_bytes()
            && case == TESTCASE.as_bytes())
}

fn is_preconditions(path: &[Vec<u8>]) -> bool {
    matches!(path, [parent @ .., last]
        if last == PRECONDITIONS.as_bytes() && is_testcase(parent))
}

/// Returns the preserved preconditions for a test case, if it has any.
fn match_testcase<'c>(
    start: &BytesStart<'_>,
    comments: &'c CommentsMap,
    seen: &mut BTreeSet<String>,
) -> Result<Option<&'c str>, ReinjectError> {
    let Some(name) = testcase_name(start)? else {
        return Ok(None);
    };
    let Some(text) = comments.get(&name) else {
        return Ok(None);
    };
    if !seen.insert(name.clone()) {
        return Err(ReinjectError::DuplicateTitle(name));
    }
    Ok(Some(text))
}

fn testcase_name(start: &BytesStart<'_>) -> Result<Option<String>, ReinjectError> {
    for attribute in start.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == b"name" {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
