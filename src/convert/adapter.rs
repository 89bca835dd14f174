//! Turning a mind-map document into a suite graph.

use crate::domain::{Document, ExecutionType, TestCase, TestStep, TestSuite, Topic};

/// Converts a mind-map document into a [`TestSuite`].
///
/// This is the generic conversion step of the pipeline. It is not expected to
/// know about preconditions: any `comments` side channel on the topics is
/// ignored.
pub trait SuiteAdapter {
    /// Builds the suite graph for a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not have the shape the adapter
    /// expects.
    fn to_suite(&self, document: &Document) -> Result<TestSuite, AdapterError>;
}

/// Errors returned by a [`SuiteAdapter`].
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The document has no sheet with a root topic.
    #[error("the mind map has no root topic")]
    NoRootTopic,
}

/// The default adapter, following the usual xmind-to-TestLink layout.
///
/// Only the first sheet is converted.
///
/// | depth | becomes    | title     | note                     | children       |
/// |-------|------------|-----------|--------------------------|----------------|
/// | 0     | root suite | name      | details                  | sub-suites     |
/// | 1     | sub-suite  | name      | details                  | test cases     |
/// | 2     | test case  | name      | summary, preconditions   | steps          |
/// | 3     | step       | action    |                          | expected result|
///
/// A test case's importance comes from a `priority-N` marker (2 if absent)
/// and its requirement link from its first label.
#[derive(Debug, Clone, Copy, Default)]
pub struct MindMapAdapter;

impl SuiteAdapter for MindMapAdapter {
    fn to_suite(&self, document: &Document) -> Result<TestSuite, AdapterError> {
        let root = document
            .first()
            .and_then(|sheet| sheet.root_topic.as_ref())
            .ok_or(AdapterError::NoRootTopic)?;

        Ok(TestSuite {
            name: root.title_text().to_string(),
            details: note(root),
            sub_suites: root.attached().iter().map(sub_suite).collect(),
            testcase_list: Vec::new(),
        })
    }
}

fn note(topic: &Topic) -> String {
    topic.plain_note().unwrap_or_default().to_string()
}

fn sub_suite(topic: &Topic) -> TestSuite {
    TestSuite {
        name: topic.title_text().to_string(),
        details: note(topic),
        sub_suites: Vec::new(),
        testcase_list: topic.attached().iter().map(testcase).collect(),
    }
}

fn testcase(topic: &Topic) -> TestCase {
    let note = note(topic);
    TestCase {
        name: topic.title_text().to_string(),
        summary: note.clone(),
        preconditions: note,
        execution_type: ExecutionType::Manual,
        importance: topic.priority().unwrap_or(2),
        doc_id: topic.labels.first().cloned(),
        steps: topic
            .attached()
            .iter()
            .enumerate()
            .map(|(i, step)| TestStep {
                number: i + 1,
                action: step.title_text().to_string(),
                expected: step
                    .attached()
                    .first()
                    .map(|expected| expected.title_text().to_string())
                    .unwrap_or_default(),
                execution_type: ExecutionType::Manual,
            })
            .collect(),
    }
}
