//! AI decision-making module (per-agent layer)
//!
//! Agent FSM: Patrol / PathFollowing / Attack / Pursuit / Investigate /
//! Vigilance / Regroup / Dead. Выбор целей — perception, выбор позиций —
//! tactics, групповые решения — squad.
//!
//! Системы регистрирует `TacticalPlugin` одной `.chain()` (см. lib.rs).

pub mod components;
pub mod events;
pub mod systems;

// Re-export основных типов
pub use components::*;
pub use events::{DamageTaken, SensorEvent, WeaponFireIntent};
pub use systems::*;
