//! AI systems (agent state machine + reactions)

pub mod fsm;
pub mod reactions;

// Re-export all systems
pub use fsm::agent_fsm_update;
pub use reactions::*;
