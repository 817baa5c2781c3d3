//! Configuration model for bakeoff.
//!
//! Defines the `Config` struct backing `.bakeoff/config.yaml`. Parsing is
//! forward compatible (unknown keys are ignored), every key has a default,
//! and values are validated after load.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use types::{AgentProfile, PromptOverrides, PublishSettings};
