//! Job orchestration: composes upload intake, asset resolution, storage
//! layout and engine invocation into a single submit operation.

pub mod admission;
pub mod error;
pub mod orchestrator;

pub use admission::Admission;
pub use error::{JobError, JobOutcome};
pub use orchestrator::{JobRequest, Orchestrator, TargetSource};
