//! Run coordination.
//!
//! - **Model**: `Run`, `Task` and their guarded state transitions
//! - **Executor**: one attempt from prompt to terminal status
//! - **Coordinator**: the phase state machine with always-on reclamation
//! - **Report**: the serializable run summary and its exit code

mod coordinator;
mod executor;
mod model;
mod report;


pub use coordinator::{Collaborators, Coordinator, RunFailure, execute_run};
pub use executor::{RESULT_FILE, TaskExecutor, result_artifact_path};
pub use model::{InvalidTransition, Run, RunPhase, RunStateError, Task, TaskStatus, TerminalState};
pub use report::{RunOutcome, RunReport, TaskSummary};
