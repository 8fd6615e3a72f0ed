//! Build scheduling for crossbuild.
//!
//! Resolves the modules a build needs into an execution order, arranges
//! them into a job tree (sequential phases, parallel targets), runs the tree
//! while rendering live progress, and consults the build cache before and
//! after.

pub mod error;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod resolver;

pub use error::{EngineError, EngineResult};
pub use job::{Job, JobStatus};
pub use orchestrator::{BuildOrchestrator, BuildOutcome, RunOptions};
pub use progress::{ProgressReporter, ProgressStyle};
pub use resolver::resolve;
