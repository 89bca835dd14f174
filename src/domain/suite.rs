//! The suite/case/step graph that is rendered to TestLink XML.

use std::fmt;

/// A test suite.
///
/// Only one level of nesting is rendered: the sub-suites of the root suite
/// become `testsuite` elements, their own sub-suites are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    /// The suite name.
    pub name: String,
    /// Free-text details.
    pub details: String,
    /// Nested suites, in order.
    pub sub_suites: Vec<TestSuite>,
    /// Test cases, in order.
    pub testcase_list: Vec<TestCase>,
}

/// A test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    /// The test case name.
    pub name: String,
    /// Free-text summary.
    pub summary: String,
    /// Free-text preconditions.
    pub preconditions: String,
    /// Whether the case is run manually or automatically.
    pub execution_type: ExecutionType,
    /// Priority code, where 1 is the highest priority.
    pub importance: i64,
    /// Identifier of a linked requirement.
    pub doc_id: Option<String>,
    /// Steps, in order.
    pub steps: Vec<TestStep>,
}

/// A single step of a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestStep {
    /// The 1-based step number.
    pub number: usize,
    /// What to do.
    pub action: String,
    /// What should happen.
    pub expected: String,
    /// Whether the step is run manually or automatically.
    pub execution_type: ExecutionType,
}

/// How a test case or step is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionType {
    /// Executed by a person.
    #[default]
    Manual,
    /// Executed by a test harness.
    Automated,
}

impl ExecutionType {
    /// The numeric code TestLink uses for this execution type.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Manual => 1,
            Self::Automated => 2,
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
