//! TestLink XML rendering.

use std::{fmt::Display, io, path::Path};

use quick_xml::{
    Reader, Writer,
    escape::partial_escape,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use tracing::instrument;

use crate::domain::{RequirementRecord, Requirements, TestCase, TestStep, TestSuite};

mod tags {
    pub const TESTSUITE: &str = "testsuite";
    pub const DETAILS: &str = "details";
    pub const TESTCASE: &str = "testcase";
    pub const SUMMARY: &str = "summary";
    pub const PRECONDITIONS: &str = "preconditions";
    pub const STEPS: &str = "steps";
    pub const STEP: &str = "step";
    pub const STEP_NUMBER: &str = "step_number";
    pub const ACTIONS: &str = "actions";
    pub const EXPECTED: &str = "expectedresults";
    pub const EXECUTION_TYPE: &str = "execution_type";
    pub const IMPORTANCE: &str = "importance";
    pub const REQUIREMENTS: &str = "requirements";
    pub const REQUIREMENT: &str = "requirement";
    pub const REQ_SPEC_TITLE: &str = "req_spec_title";
    pub const DOC_ID: &str = "doc_id";
    pub const VERSION: &str = "version";
    pub const TITLE: &str = "title";
    pub const NAME: &str = "name";
}

pub(crate) use tags::{PRECONDITIONS, TESTCASE, TESTSUITE};

/// Rendered TestLink XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The UTF-8 encoded document, including the XML declaration.
    pub xml: Vec<u8>,
    /// The number of test cases written.
    pub testcase_count: usize,
}

/// Errors that can occur while rendering.
#[derive(Debug, thiserror::Error)]
#[error("failed to render TestLink XML")]
pub enum RenderError {
    /// The writer failed.
    Io(#[from] io::Error),
    /// The writer rejected an event.
    Xml(#[from] quick_xml::Error),
}

/// Renders a suite graph as TestLink XML.
///
/// The root suite becomes the document element. Its sub-suites and their test
/// cases are written below it; deeper sub-suites are not rendered. Suites,
/// test cases and steps whose name (or action, for steps) is blank or starts
/// with `!` are left out.
///
/// Test cases with a `doc_id` found in `requirements` get a `requirements`
/// block linking them to that requirement.
///
/// # Errors
///
/// Returns an error if the XML writer fails.
#[instrument(skip_all, fields(suite = %suite.name))]
pub fn render(suite: &TestSuite, requirements: &Requirements) -> Result<Rendered, RenderError> {
    let mut emitter = Emitter {
        writer: Writer::new_with_indent(Vec::new(), b'\t', 1),
        requirements,
        testcase_count: 0,
    };
    emitter
        .writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emitter.root(suite)?;

    let testcase_count = emitter.testcase_count;
    let mut xml = emitter.writer.into_inner();
    xml.push(b'\n');

    tracing::debug!(testcases = testcase_count, "rendered TestLink XML");
    Ok(Rendered {
        xml,
        testcase_count,
    })
}

/// Maps a priority code to TestLink's importance.
///
/// Priority 1 is the most important, while TestLink's importance 3 is the
/// highest. Unknown codes are treated as medium.
#[must_use]
pub const fn importance(priority: i64) -> &'static str {
    match priority {
        1 => "3",
        3 => "1",
        _ => "2",
    }
}

/// Whether a suite, test case or step should be left out.
fn should_skip(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with('!')
}

/// Whether a text field has content worth writing.
fn should_write(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('!')
}

/// Escapes markup characters and turns line breaks into `<br />` tags, keeping
/// a newline after each tag so the source stays readable.
fn encode_text(content: &str) -> String {
    partial_escape(content)
        .replace("\r\n", "<br />")
        .replace('\n', "<br />")
        .replace("<br />", "<br />\n")
}

/// Splits text into CDATA section bodies so that no section contains `]]>`.
fn cdata_sections(content: &str) -> Vec<String> {
    let parts: Vec<&str> = content.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let open = if i == 0 { "" } else { ">" };
            let close = if i == last { "" } else { "]]" };
            format!("{open}{part}{close}")
        })
        .collect()
}

/// Rendering state for a single [`render`] call.
struct Emitter<'a> {
    writer: Writer<Vec<u8>>,
    requirements: &'a Requirements,
    testcase_count: usize,
}

impl Emitter<'_> {
    fn start(&mut self, tag: &str, name: Option<&str>) -> Result<(), RenderError> {
        let mut start = BytesStart::new(tag);
        if let Some(name) = name {
            start.push_attribute((tags::NAME, name));
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<(), RenderError> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    /// Writes a free-text field as CDATA, if it has content.
    fn text_field(&mut self, tag: &str, value: &str) -> Result<(), RenderError> {
        if !should_write(value) {
            return Ok(());
        }
        self.start(tag, None)?;
        for section in cdata_sections(&encode_text(value)) {
            self.writer
                .write_event(Event::CData(BytesCData::new(section.as_str())))?;
        }
        self.end(tag)
    }

    /// Writes a free-text field that is always present, as an empty element
    /// when there is no content. Disabled values are still left out.
    fn placeholder_field(&mut self, tag: &str, value: &str) -> Result<(), RenderError> {
        if value.is_empty() {
            self.writer.write_event(Event::Empty(BytesStart::new(tag)))?;
            return Ok(());
        }
        self.text_field(tag, value)
    }

    fn number_field(&mut self, tag: &str, value: impl Display) -> Result<(), RenderError> {
        self.start(tag, None)?;
        self.writer
            .write_event(Event::Text(BytesText::new(&value.to_string())))?;
        self.end(tag)
    }

    fn root(&mut self, suite: &TestSuite) -> Result<(), RenderError> {
        self.start(tags::TESTSUITE, Some(suite.name.as_str()))?;
        for sub_suite in suite.sub_suites.iter().filter(|s| !should_skip(&s.name)) {
            self.suite(sub_suite)?;
        }
        self.end(tags::TESTSUITE)
    }

    fn suite(&mut self, suite: &TestSuite) -> Result<(), RenderError> {
        self.start(tags::TESTSUITE, Some(suite.name.as_str()))?;
        self.text_field(tags::DETAILS, &suite.details)?;
        for testcase in suite.testcase_list.iter().filter(|c| !should_skip(&c.name)) {
            self.testcase(testcase)?;
        }
        self.end(tags::TESTSUITE)
    }

    fn testcase(&mut self, testcase: &TestCase) -> Result<(), RenderError> {
        self.testcase_count += 1;
        self.start(tags::TESTCASE, Some(testcase.name.as_str()))?;
        self.text_field(tags::SUMMARY, &testcase.summary)?;
        // Preserved preconditions can only be re-injected into an existing element.
        self.placeholder_field(tags::PRECONDITIONS, &testcase.preconditions)?;
        self.number_field(tags::EXECUTION_TYPE, testcase.execution_type)?;
        self.number_field(tags::IMPORTANCE, importance(testcase.importance))?;
        self.requirement(testcase)?;
        self.steps(&testcase.steps)?;
        self.end(tags::TESTCASE)
    }

    fn requirement(&mut self, testcase: &TestCase) -> Result<(), RenderError> {
        let Some(doc_id) = testcase.doc_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(());
        };
        let requirements = self.requirements;
        let Some(record) = requirements.get(doc_id) else {
            tracing::debug!(doc_id, testcase = %testcase.name, "requirement not found");
            return Ok(());
        };
        let RequirementRecord {
            req_spec_title,
            title,
            version,
            ..
        } = record;

        self.start(tags::REQUIREMENTS, None)?;
        self.start(tags::REQUIREMENT, None)?;
        self.text_field(tags::REQ_SPEC_TITLE, req_spec_title)?;
        self.text_field(tags::DOC_ID, doc_id)?;
        self.text_field(tags::VERSION, version)?;
        self.text_field(tags::TITLE, title)?;
        self.end(tags::REQUIREMENT)?;
        self.end(tags::REQUIREMENTS)
    }

    fn steps(&mut self, steps: &[TestStep]) -> Result<(), RenderError> {
        if steps.is_empty() {
            return Ok(());
        }
        self.start(tags::STEPS, None)?;
        for step in steps.iter().filter(|s| !should_skip(&s.action)) {
            self.start(tags::STEP, None)?;
            self.text_field(tags::ACTIONS, &step.action)?;
            self.text_field(tags::EXPECTED, &step.expected)?;
            self.number_field(tags::EXECUTION_TYPE, step.execution_type)?;
            self.number_field(tags::STEP_NUMBER, step.number)?;
            self.end(tags::STEP)?;
        }
        self.end(tags::STEPS)
    }
}

/// Errors that can occur while reading a requirement specification.
#[derive(Debug, thiserror::Error)]
pub enum RequirementsError {
    /// The file could not be read.
    #[error("failed to read requirements file {}", path.display())]
    Read {
        /// The requirements file.
        path: std::path::PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not well-formed XML.
    #[error("malformed requirements XML")]
    Xml(#[from] quick_xml::Error),
    /// A text node contains an invalid escape sequence.
    #[error("malformed requirements XML")]
    Escape(#[from] quick_xml::escape::EscapeError),
}

/// Reads a TestLink requirement specification file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not well-formed XML.
#[instrument]
pub fn parse_requirements(path: &Path) -> Result<Requirements, RequirementsError> {
    let xml = std::fs::read_to_string(path).map_err(|source| RequirementsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let requirements = requirements_from_str(&xml)?;
    tracing::debug!(count = requirements.len(), "loaded requirements");
    Ok(requirements)
}

/// Reads requirement records from TestLink requirement specification XML.
///
/// Every `requirement` element is read, however deeply nested. Records
/// without a `doc_id` are skipped. Values are trimmed.
///
/// # Errors
///
/// Returns an error if the XML is not well-formed.
pub fn requirements_from_str(xml: &str) -> Result<Requirements, RequirementsError> {
    let mut reader = Reader::from_str(xml);
    let mut requirements = Requirements::default();
    let mut current: Option<RequirementRecord> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"requirement" => current = Some(RequirementRecord::default()),
                name if current.is_some() => field = Field::from_tag(name),
                _ => {}
            },
            Event::Text(text) => {
                if let (Some(record), Some(field)) = (current.as_mut(), field) {
                    field.push(record, &text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let (Some(record), Some(field)) = (current.as_mut(), field) {
                    field.push(record, &String::from_utf8_lossy(&data));
                }
            }
            Event::End(end) => {
                if end.name().as_ref() == b"requirement" {
                    if let Some(record) = current.take().and_then(finish) {
                        requirements.insert(record);
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(requirements)
}

fn finish(mut record: RequirementRecord) -> Option<RequirementRecord> {
    for value in [
        &mut record.doc_id,
        &mut record.req_spec_title,
        &mut record.title,
        &mut record.version,
    ] {
        *value = value.trim().to_string();
    }
    (!record.doc_id.is_empty()).then_some(record)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    DocId,
    ReqSpecTitle,
    Title,
    Version,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"doc_id" => Some(Self::DocId),
            b"req_spec_title" => Some(Self::ReqSpecTitle),
            b"title" => Some(Self::Title),
            b"version" => Some(Self::Version),
            _ => None,
        }
    }

    fn push(self, record: &mut RequirementRecord, text: &str) {
        let value = match self {
            Self::DocId => &mut record.doc_id,
            Self::ReqSpecTitle => &mut record.req_spec_title,
            Self::Title => &mut record.title,
            Self::Version => &mut record.version,
        };
        value.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::ExecutionType;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.to_string(),
            importance: 2,
            ..TestCase::default()
        }
    }

    fn suite_with(cases: Vec<TestCase>) -> TestSuite {
        TestSuite {
            name: "Root".to_string(),
            sub_suites: vec![TestSuite {
                name: "Suite".to_string(),
                testcase_list: cases,
                ..TestSuite::default()
            }],
            ..TestSuite::default()
        }
    }

    fn render_string(suite: &TestSuite, requirements: &Requirements) -> String {
        String::from_utf8(render(suite, requirements).unwrap().xml).unwrap()
    }

    #[test_case(1, "3"; "highest priority")]
    #[test_case(2, "2"; "medium priority")]
    #[test_case(3, "1"; "lowest priority")]
    #[test_case(0, "2"; "zero")]
    #[test_case(4, "2"; "above range")]
    #[test_case(-1, "2"; "negative")]
    #[test_case(i64::MAX, "2"; "max")]
    fn importance_mapping(priority: i64, expected: &str) {
        assert_eq!(importance(priority), expected);
    }

    #[test]
    fn renders_nested_structure_with_tab_indent() {
        let mut testcase = case("Login works");
        testcase.summary = "Check login".to_string();
        testcase.preconditions = "User exists".to_string();
        testcase.importance = 1;
        testcase.steps = vec![TestStep {
            number: 1,
            action: "Enter credentials".to_string(),
            expected: "Logged in".to_string(),
            execution_type: ExecutionType::Manual,
        }];

        let xml = render_string(&suite_with(vec![testcase]), &Requirements::default());

        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<testsuite name=\"Root\">
\t<testsuite name=\"Suite\">
\t\t<testcase name=\"Login works\">
\t\t\t<summary><![CDATA[Check login]]></summary>
\t\t\t<preconditions><![CDATA[User exists]]></preconditions>
\t\t\t<execution_type>1</execution_type>
\t\t\t<importance>3</importance>
\t\t\t<steps>
\t\t\t\t<step>
\t\t\t\t\t<actions><![CDATA[Enter credentials]]></actions>
\t\t\t\t\t<expectedresults><![CDATA[Logged in]]></expectedresults>
\t\t\t\t\t<execution_type>1</execution_type>
\t\t\t\t\t<step_number>1</step_number>
\t\t\t\t</step>
\t\t\t</steps>
\t\t</testcase>
\t</testsuite>
</testsuite>
";
        assert_eq!(xml, expected);
    }

    #[test]
    fn skipped_names_are_not_rendered() {
        let mut kept = case("Kept");
        kept.steps = vec![
            TestStep {
                number: 1,
                action: "!disabled step".to_string(),
                ..TestStep::default()
            },
            TestStep {
                number: 2,
                action: "   ".to_string(),
                ..TestStep::default()
            },
            TestStep {
                number: 3,
                action: "real step".to_string(),
                ..TestStep::default()
            },
        ];
        let mut suite = suite_with(vec![kept, case("!Disabled"), case(""), case(" \t ")]);
        suite.sub_suites.push(TestSuite {
            name: "!Hidden suite".to_string(),
            testcase_list: vec![case("Hidden case")],
            ..TestSuite::default()
        });
        suite.sub_suites.push(TestSuite {
            name: "  ".to_string(),
            ..TestSuite::default()
        });

        let rendered = render(&suite, &Requirements::default()).unwrap();
        let xml = String::from_utf8(rendered.xml).unwrap();

        assert_eq!(rendered.testcase_count, 1);
        assert_eq!(xml.matches("<testsuite ").count(), 2);
        assert!(xml.contains("name=\"Kept\""));
        assert!(!xml.contains("Disabled"));
        assert!(!xml.contains("Hidden"));
        assert_eq!(xml.matches("<step>").count(), 1);
        assert!(xml.contains("<step_number>3</step_number>"));
    }

    #[test]
    fn deeper_suites_are_not_rendered() {
        let mut suite = suite_with(vec![case("Case")]);
        suite.sub_suites[0].sub_suites.push(TestSuite {
            name: "Nested".to_string(),
            testcase_list: vec![case("Nested case")],
            ..TestSuite::default()
        });

        let xml = render_string(&suite, &Requirements::default());

        assert!(!xml.contains("Nested"));
    }

    #[test]
    fn empty_and_disabled_fields_are_omitted() {
        let mut testcase = case("Case");
        testcase.summary = "!internal note".to_string();
        let mut suite = suite_with(vec![testcase]);
        suite.sub_suites[0].details = "Suite details".to_string();

        let xml = render_string(&suite, &Requirements::default());

        assert!(xml.contains("<details><![CDATA[Suite details]]></details>"));
        assert!(!xml.contains("<summary>"));
        assert!(!xml.contains("<steps>"));
    }

    #[test]
    fn blank_preconditions_render_as_empty_element() {
        let mut disabled = case("Disabled");
        disabled.preconditions = "!draft".to_string();
        let suite = suite_with(vec![case("Blank"), disabled]);

        let xml = render_string(&suite, &Requirements::default());

        assert!(xml.contains(
            "<testcase name=\"Blank\">\n\t\t\t<preconditions/>\n\t\t\t<execution_type>"
        ));
        assert_eq!(xml.matches("<preconditions").count(), 1);
        assert!(!xml.contains("draft"));
    }

    #[test]
    fn text_is_escaped_and_line_breaks_become_tags() {
        let mut testcase = case("Case");
        testcase.summary = "a < b & c\r\nsecond\nthird".to_string();

        let xml = render_string(&suite_with(vec![testcase]), &Requirements::default());

        assert!(xml.contains(
            "<summary><![CDATA[a &lt; b &amp; c<br />\nsecond<br />\nthird]]></summary>"
        ));
    }

    #[test]
    fn cdata_terminator_is_split() {
        assert_eq!(cdata_sections("plain"), ["plain"]);
        assert_eq!(cdata_sections("a]]>b"), ["a]]", ">b"]);
        assert_eq!(cdata_sections("]]>]]>"), ["]]", ">]]", ">"]);
    }

    #[test]
    fn content_with_cdata_terminator_stays_well_formed() {
        let mut testcase = case("Case");
        testcase.summary = "before ]]> after".to_string();
        let xml = render_string(&suite_with(vec![testcase]), &Requirements::default());

        let mut reader = Reader::from_str(&xml);
        let mut summary = String::new();
        let mut in_summary = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"summary" => in_summary = true,
                Event::End(e) if e.name().as_ref() == b"summary" => in_summary = false,
                Event::CData(data) if in_summary => {
                    summary.push_str(&String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(summary, "before ]]&gt; after");
    }

    #[test]
    fn requirement_block_links_known_doc_id() {
        let requirements: Requirements = [RequirementRecord {
            doc_id: "REQ-1".to_string(),
            req_spec_title: "Auth".to_string(),
            title: "Users can log in".to_string(),
            version: String::new(),
        }]
        .into_iter()
        .collect();
        let mut linked = case("Linked");
        linked.doc_id = Some("REQ-1".to_string());
        let mut unknown = case("Unknown");
        unknown.doc_id = Some("REQ-404".to_string());

        let xml = render_string(&suite_with(vec![linked, unknown]), &requirements);

        assert_eq!(xml.matches("<requirements>").count(), 1);
        assert!(xml.contains("<req_spec_title><![CDATA[Auth]]></req_spec_title>"));
        assert!(xml.contains("<doc_id><![CDATA[REQ-1]]></doc_id>"));
        assert!(xml.contains("<title><![CDATA[Users can log in]]></title>"));
        assert!(!xml.contains("<version>"));
    }

    #[test]
    fn testcase_count_is_per_call() {
        let suite = suite_with(vec![case("A"), case("B")]);
        let requirements = Requirements::default();

        assert_eq!(render(&suite, &requirements).unwrap().testcase_count, 2);
        assert_eq!(render(&suite, &requirements).unwrap().testcase_count, 2);
    }

    #[test]
    fn requirements_are_read_from_any_depth() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<requirement-specification>
    <req_spec title="Auth" doc_id="SPEC-1">
        <requirement>
            <docid>ignored</docid>
            <doc_id><![CDATA[ REQ-1 ]]></doc_id>
            <req_spec_title>Auth</req_spec_title>
            <title>Users can &amp; log in</title>
            <version>2</version>
        </requirement>
        <requirement>
            <title>No id</title>
        </requirement>
    </req_spec>
    <requirement>
        <doc_id>REQ-2</doc_id>
    </requirement>
</requirement-specification>
"#;

        let requirements = requirements_from_str(xml).unwrap();

        assert_eq!(requirements.len(), 2);
        assert_eq!(
            requirements.get("REQ-1"),
            Some(&RequirementRecord {
                doc_id: "REQ-1".to_string(),
                req_spec_title: "Auth".to_string(),
                title: "Users can & log in".to_string(),
                version: "2".to_string(),
            })
        );
        assert_eq!(requirements.get("REQ-2").unwrap().title, "");
    }

    #[test]
    fn malformed_requirements_are_an_error() {
        assert!(requirements_from_str("<requirement><doc_id>x</requirement>").is_err());
    }

    #[test]
    fn missing_requirements_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let error = parse_requirements(&tmp.path().join("missing.xml")).unwrap_err();
        assert!(matches!(error, RequirementsError::Read { .. }));
    }
}
