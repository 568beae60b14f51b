//! Degree progress tracking for university transcripts.
//!
//! Load a transcript with [`loader`], hand it to a [`ProgressEngine`] along
//! with a [`RequirementsCatalog`], and read the resulting
//! [`ProgressSnapshot`].

pub mod catalog;
pub mod engine;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod report;
pub mod tracks;

pub use catalog::{RequirementsCatalog, ResolvedTrack, SuPolicy, TrackKind, TrackRequirement};
pub use engine::ProgressEngine;
pub use error::{Error, Result};
pub use models::{CourseRecord, Grade, ProgressSnapshot, SuQuota, TermCgpa, TrackStatus};
pub use optimizer::{ExhaustiveSolver, GradeAssignment, GradeSolver, HypotheticalPlan};
