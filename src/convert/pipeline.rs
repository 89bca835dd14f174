//! The end-to-end conversion.
//!
//! A run goes through four stages:
//!
//! 1. split precondition text out of notes into a corrected archive;
//! 2. convert the corrected archive to a suite graph;
//! 3. render the suite graph as TestLink XML;
//! 4. re-inject the preserved preconditions into the XML.
//!
//! Stage 1 and the requirements lookup degrade: if they fail, the run carries
//! on with the original archive or without requirement links, and the failure
//! is recorded in the [`ConversionReport`]. Every other failure aborts the run
//! with a [`PipelineError`] and leaves no output file behind.
//!
//! All intermediate files are written to an [`Arena`] that is removed when the
//! run ends, however it ends.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::{
    convert::{
        adapter::{AdapterError, MindMapAdapter, SuiteAdapter},
        precondition::{PreconditionExtractor, PreprocessError},
        reinject::{self, CommentsMap, ReinjectError},
        testlink::{self, RenderError, RequirementsError},
    },
    domain::{Config, Requirements},
    storage::{
        archive::Arena,
        document::{self, DocumentError},
    },
};

/// A stage that failed without stopping the run.
#[derive(Debug, thiserror::Error)]
pub enum Degradation {
    /// Pre-processing failed, so the original archive was converted.
    /// Preconditions are left as the converter produced them.
    #[error("precondition pre-processing failed; converted the original archive instead")]
    Preprocess(#[source] PreprocessError),

    /// The requirements file could not be loaded, so no test case is linked
    /// to a requirement.
    #[error("requirements could not be loaded; requirement links are omitted")]
    Requirements(#[source] RequirementsError),

    /// The preserved preconditions could not be read back, so the converter
    /// output is kept unchanged.
    #[error("preserved preconditions could not be read; output left as converted")]
    Comments(#[source] DocumentError),
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The scratch arena could not be created.
    #[error("failed to create a scratch directory")]
    Arena(#[source] io::Error),

    /// The configured precondition marker could not be compiled.
    #[error("invalid precondition marker")]
    Marker(#[from] regex::Error),

    /// The archive to convert could not be read.
    #[error("failed to read the mind map")]
    Document(#[from] DocumentError),

    /// The mind map could not be converted to a suite graph.
    #[error("failed to convert the mind map")]
    Adapter(#[from] AdapterError),

    /// The suite graph could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The intermediate XML could not be written.
    #[error("failed to write {}", path.display())]
    Write {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The preconditions could not be re-injected.
    #[error("failed to re-inject preconditions")]
    Reinject(#[from] ReinjectError),
}

/// The outcome of a successful run.
#[derive(Debug)]
pub struct ConversionReport {
    /// The TestLink XML file that was written.
    pub output: PathBuf,
    /// The number of test cases in the output.
    pub testcase_count: usize,
    /// The number of test cases whose preconditions were re-injected.
    pub preconditions_injected: usize,
    /// Stages that failed without stopping the run.
    pub degradations: Vec<Degradation>,
}

impl ConversionReport {
    /// Returns `true` if every stage succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }
}

/// Converts mind-map archives to TestLink XML, preserving preconditions.
#[derive(Debug, Clone)]
pub struct Pipeline<A = MindMapAdapter> {
    config: Config,
    adapter: A,
}

impl Pipeline {
    /// Creates a pipeline using the default [`MindMapAdapter`].
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            adapter: MindMapAdapter,
        }
    }
}

impl<A: SuiteAdapter> Pipeline<A> {
    /// Replaces the tree to suite conversion.
    #[must_use]
    pub fn with_adapter<B: SuiteAdapter>(self, adapter: B) -> Pipeline<B> {
        Pipeline {
            config: self.config,
            adapter,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Converts `input` and writes the result next to it, with the extension
    /// replaced by `.xml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mind map cannot be read or converted, the XML
    /// cannot be written, or the preconditions cannot be re-injected. No output
    /// file is written in that case.
    #[instrument(skip(self))]
    pub fn run(&self, input: &Path) -> Result<ConversionReport, PipelineError> {
        let arena = Arena::new().map_err(PipelineError::Arena)?;
        let mut degradations = Vec::new();

        let extractor = PreconditionExtractor::new(self.config.precondition_marker())?;
        let archive = match extractor.preprocess(input, &arena) {
            Ok(corrected) => corrected,
            Err(error) => {
                tracing::warn!(error = %error, "pre-processing failed; using the original archive");
                degradations.push(Degradation::Preprocess(error));
                input.to_path_buf()
            }
        };

        let requirements = self.requirements(&mut degradations);

        let suite = self
            .adapter
            .to_suite(&document::read_archive(&archive, &arena)?)?;
        let rendered = testlink::render(&suite, &requirements)?;

        let generated =
            arena.file(Path::new(archive.file_name().unwrap_or_default()).with_extension("xml"));
        fs::write(&generated, &rendered.xml).map_err(|source| PipelineError::Write {
            path: generated.clone(),
            source,
        })?;

        let comments = match reinject::comments_from_archive(&archive, &arena) {
            Ok(comments) => comments,
            Err(ReinjectError::Document(error)) => {
                tracing::warn!(error = %error, "could not read preserved preconditions");
                degradations.push(Degradation::Comments(error));
                CommentsMap::default()
            }
            Err(error) => return Err(error.into()),
        };

        let output = input.with_extension("xml");
        let preconditions_injected = reinject::reinject(&generated, &comments, &output)?;

        tracing::info!(
            output = %output.display(),
            testcases = rendered.testcase_count,
            preconditions = preconditions_injected,
            "conversion complete"
        );
        Ok(ConversionReport {
            output,
            testcase_count: rendered.testcase_count,
            preconditions_injected,
            degradations,
        })
    }

    fn requirements(&self, degradations: &mut Vec<Degradation>) -> Requirements {
        let Some(path) = &self.config.requirements else {
            return Requirements::default();
        };
        match testlink::parse_requirements(path) {
            Ok(requirements) => {
                if requirements.is_empty() {
                    tracing::warn!(path = %path.display(), "requirements file has no requirements");
                } else {
                    tracing::debug!(count = requirements.len(), "loaded requirements");
                }
                requirements
            }
            Err(error) => {
                tracing::warn!(error = %error, "could not load requirements");
                degradations.push(Degradation::Requirements(error));
                Requirements::default()
            }
        }
    }
}
