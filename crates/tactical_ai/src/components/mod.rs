//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: фракция, здоровье, цели, турели, sensor/weapon offsets
//! - movement: навигация и перемещение (MovementCommand, NavigationState, LookAt)
//!
//! AI/squad компоненты живут в своих модулях (crate::ai, crate::squad).

pub mod actor;
pub mod movement;

// Re-exports для удобного импорта
pub use actor::*;
pub use movement::*;
