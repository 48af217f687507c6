//! The three roles of a run: orchestrator, sub-agent and refiner

pub mod extract;
pub mod orchestrator;
pub mod refiner;
pub mod sub_agent;

pub use extract::{COMPLETION_MARKER, ExtractedQuery, extract_search_query, is_complete};
pub use orchestrator::{Orchestrator, OrchestratorStep, QueryExtraction};
pub use refiner::Refiner;
pub use sub_agent::{SearchOutcome, SubAgent, SubAgentReply};
