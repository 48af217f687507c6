//! Tasksmith - objective decomposition with an orchestrator loop
//!
//! An orchestrator splits an objective into sub-tasks, a sub-agent executes
//! each one (optionally with web search context), and a refiner folds every
//! result into the final output.

pub mod agents;
pub mod artifact;
pub mod config;
pub mod error;
pub mod id;
pub mod llm;
pub mod runner;
pub mod search;

pub use error::{Result, TasksmithError};
