//! Workout plan synthesis with validation and repair.
//!
//! ```text
//! Catalog --filter(profile)--> AllowedList
//!     --Synthesizer--> Plan --validate--> issues
//!         --Repairer--> Plan --validate--> ... until pass or budget spent
//! ```
//!
//! [`pipeline::Pipeline`] drives the whole sequence; each stage is also
//! usable on its own. [`assist::Assistant`] runs the model-backed jobs on a
//! finished plan (explain, answer, swap).

pub mod allowed;
pub mod assist;
pub mod catalog;
pub mod export;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod repair;
pub mod synth;
pub mod validate;

pub use allowed::{AllowedList, FilterError, filter};
pub use catalog::{Catalog, CatalogError};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineOutcome, SoftIssuePolicy, Termination,
};
pub use validate::validate;
