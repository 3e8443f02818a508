// src/dag/mod.rs

//! Task graph construction and execution.
//!
//! - [`task`] declares tasks and their input patterns.
//! - [`graph`] infers dependency edges from outputs to inputs and sorts
//!   the tasks into an [`ExecutionPlan`].
//! - [`scheduler`] runs a plan (fully or incrementally) and produces a
//!   [`RunReport`].
//! - [`cache`] keeps produced artifacts and source hashes between runs.

pub mod cache;
pub mod graph;
pub mod plan;
pub mod report;
pub mod scheduler;
pub mod task;

pub use cache::ArtifactCache;
pub use graph::TaskGraph;
pub use plan::ExecutionPlan;
pub use report::{RunReport, TaskReport, TaskStatus};
pub use scheduler::Scheduler;
pub use task::{EachOutput, InputPattern, Task, TaskName, TaskOutput};
