//! The document stored in an archive's `content.json`.
//!
//! Only the fields the conversion reads are typed. Everything else is kept in
//! the `extra` maps so a document can be written back without losing data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parsed `content.json`: one entry per sheet.
pub type Document = Vec<Sheet>;

/// A single sheet of a mind map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// The root of the sheet's topic tree.
    #[serde(
        rename = "rootTopic",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub root_topic: Option<Topic>,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node of the mind-map tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// The topic title. Used as the test case name and as the matching key
    /// when preconditions are re-injected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The free-text note attached to the topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,

    /// Precondition text split out of the note during pre-processing.
    ///
    /// This is not part of the mind-map format; it only exists on documents
    /// written by [`PreconditionExtractor`](crate::convert::PreconditionExtractor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    /// Child topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,

    /// Markers attached to the topic (priority flags, icons, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<TopicMarker>,

    /// Free-form labels attached to the topic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The note of a topic, stored both as plain text and as HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notes {
    /// The plain-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<NoteContent>,

    /// The HTML mirror of the note.
    #[serde(
        rename = "realHTML",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub real_html: Option<NoteContent>,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One rendition of a note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    /// The note text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The children of a topic.
///
/// Only attached children take part in the conversion. Detached (floating)
/// topics are carried in `extra` and otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Children {
    /// Attached child topics, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached: Vec<Topic>,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A marker attached to a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicMarker {
    /// The marker identifier, e.g. `priority-1`.
    #[serde(rename = "markerId", default)]
    pub marker_id: String,

    /// Fields not used by the conversion.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Topic {
    /// Creates a topic with the given title and nothing else.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets the plain-text note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let notes = self.notes.get_or_insert_with(Notes::default);
        notes.plain = Some(NoteContent {
            content: Some(note.into()),
            extra: Map::new(),
        });
        self
    }

    /// Sets the HTML mirror of the note.
    #[must_use]
    pub fn with_html_note(mut self, html: impl Into<String>) -> Self {
        let notes = self.notes.get_or_insert_with(Notes::default);
        notes.real_html = Some(NoteContent {
            content: Some(html.into()),
            extra: Map::new(),
        });
        self
    }

    /// Appends an attached child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children
            .get_or_insert_with(Children::default)
            .attached
            .push(child);
        self
    }

    /// Adds a marker.
    #[must_use]
    pub fn with_marker(mut self, marker_id: impl Into<String>) -> Self {
        self.markers.push(TopicMarker {
            marker_id: marker_id.into(),
            extra: Map::new(),
        });
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// The title, or an empty string if the topic has none.
    #[must_use]
    pub fn title_text(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// The plain-text note, if any.
    #[must_use]
    pub fn plain_note(&self) -> Option<&str> {
        self.notes
            .as_ref()?
            .plain
            .as_ref()?
            .content
            .as_deref()
    }

    /// The HTML note, if any.
    #[must_use]
    pub fn html_note(&self) -> Option<&str> {
        self.notes
            .as_ref()?
            .real_html
            .as_ref()?
            .content
            .as_deref()
    }

    /// The attached children, in order.
    #[must_use]
    pub fn attached(&self) -> &[Self] {
        self.children
            .as_ref()
            .map(|children| children.attached.as_slice())
            .unwrap_or_default()
    }

    /// The priority from a `priority-N` marker, if there is one.
    #[must_use]
    pub fn priority(&self) -> Option<i64> {
        self.markers.iter().find_map(|marker| {
            marker
                .marker_id
                .strip_prefix("priority-")
                .and_then(|n| n.parse().ok())
        })
    }

    /// Depth-first, pre-order traversal of this topic and every attached
    /// descendant.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Topic::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Topic>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Topic;

    fn next(&mut self) -> Option<Self::Item> {
        let topic = self.stack.pop()?;
        self.stack.extend(topic.attached().iter().rev());
        Some(topic)
    }
}
