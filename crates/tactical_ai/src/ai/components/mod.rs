//! AI components (FSM state, config, combat strategies).

pub mod combat;
pub mod fsm;

pub use combat::*;
pub use fsm::*;
