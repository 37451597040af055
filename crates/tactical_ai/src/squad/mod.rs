//! Squad layer: групповой FSM поверх agent FSM
//!
//! Сквад владеет списком участников и общей целью, раздаёт позиции
//! (cover → formation → firing arc → direct assault) и реагирует на отчёты.

pub mod components;
pub mod events;
pub mod planning;
pub mod systems;

pub use components::{CombatPlan, MissionMode, Squad, SquadCommand, SquadMember, SquadState};
pub use events::{SquadOrder, SquadReport};
pub use planning::{plan_engagement, EngagementPlan};
pub use systems::{attach_members, squad_fsm_update};
