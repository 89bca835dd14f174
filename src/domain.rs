//! Domain models for mind-map to TestLink conversion.
//!
//! This module contains the mind-map document tree read from an archive, the
//! suite/case/step graph rendered to TestLink XML, the external requirements
//! table, and configuration.

/// The mind-map document tree.
pub mod topic;
pub use topic::{Children, Document, NoteContent, Notes, Sheet, Topic, TopicMarker};

/// The TestLink suite/case/step graph.
pub mod suite;
pub use suite::{ExecutionType, TestCase, TestStep, TestSuite};

mod requirement;
pub use requirement::{RequirementRecord, Requirements};

mod config;
pub use config::Config;
