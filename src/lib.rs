//! Mind-map to TestLink conversion
//!
//! Converts XMind test designs into TestLink XML. Precondition text marked in
//! a topic's note survives the conversion as the test case's preconditions.

pub mod domain;
pub use domain::{Config, Document, Requirements, TestCase, TestStep, TestSuite, Topic};

/// Archive and document storage.
pub mod storage;
pub use storage::Arena;

pub mod convert;
pub use convert::{ConversionReport, Degradation, Pipeline, PipelineError};
