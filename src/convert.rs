//! The conversion pipeline and its stages.

/// Tree to suite conversion.
pub mod adapter;
pub use adapter::{AdapterError, MindMapAdapter, SuiteAdapter};

pub mod pipeline;
pub use pipeline::{ConversionReport, Degradation, Pipeline, PipelineError};

pub mod precondition;
pub use precondition::{PreconditionExtractor, PreconditionMarker, PreprocessError};

pub mod reinject;
pub use reinject::{CommentsMap, ReinjectError};

/// TestLink XML rendering and requirement specification parsing.
pub mod testlink;
pub use testlink::{Rendered, RenderError, RequirementsError, parse_requirements, render};
