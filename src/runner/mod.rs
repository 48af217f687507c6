//! Loop runner - drives a run from objective to refined output.
//!
//! This module provides:
//! - LoopController, the orchestrator/sub-agent/refiner state machine
//! - LoopState and SubTaskResult, the append-only run history
//! - RunEvent and RunObserver for progress reporting
//! - RetryPolicy and with_retry for transient provider failures

mod controller;
mod events;
mod retry;
mod state;

pub use controller::{AbortedRun, CompletedRun, ControllerConfig, LoopController, RunOutcome};
pub use events::{CompletionReason, EventLog, Fanout, LogObserver, RunEvent, RunObserver};
pub use retry::{RetryPolicy, with_retry};
pub use state::{AbortReason, LoopState, LoopStatus, SubTaskResult};
