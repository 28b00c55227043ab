//! Job classification for stagehand
//!
//! Maps conversion outcomes onto confidence levels, badge tiers and a
//! conversion method. Jobs classified [`ConversionMethod::AttentionRequired`]
//! belong in the manual review queue. Everything here is pure.

pub mod confidence;
pub mod job;
pub mod method;

pub use confidence::{BadgeTier, Classification, ConfidenceLevel, ConfidenceThresholds, classify};
pub use job::{ClassifiedJob, JobClassifier, JobOutcome};
pub use method::{ConversionMethod, JobProfile, PatternComplexity, assign_method};
