//! Agent invocation.
//!
//! - **Invoker**: the boundary trait, request/permission types and terminal-event handling
//! - **Command**: the subprocess implementation driven by an `AgentProfile`
//! - **Template**: `{variable}` rendering shared by command and prompt templates
//!
//! Agents are opaque subprocesses. Anything that speaks newline-delimited JSON
//! events (or just prints text and exits 0) can be plugged in through config.

mod command;
mod invoker;
pub mod template;

pub use command::CommandAgent;
pub use invoker::{
    AgentEvent, AgentEventStream, AgentInvoker, AgentOutcome, AgentPermissions, AgentRequest,
    await_terminal,
};
pub use template::{TemplateError, render_template, vars};
