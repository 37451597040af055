//! Perception: что агент видит и кого считает опасным
//!
//! Поток данных снизу вверх:
//! TargetRegistry (снимок целей) → LoS cache → Threat Evaluator → CurrentTarget
//! TargetSensor (trigger volume) → список кандидатов для Threat Evaluator

use bevy::prelude::*;

pub mod line_of_sight;
pub mod registry;
pub mod sensor;
pub mod threat;

pub use line_of_sight::{first_visible_point, LineOfSightCache, LosCacheEntry, Visibility};
pub use registry::{refresh_target_registry, TargetRegistry, TargetSnapshot, TurretInfo};
pub use sensor::{handle_sensor_events, prune_sensors, CurrentTarget, TargetSensor};
pub use threat::{best_target, score_target, Observer, ThreatScore, INELIGIBLE};

/// Индекс текущего simulation tick (frame index для LoS cache)
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationFrame {
    pub index: u64,
}

/// Система: новый tick → новый frame index (первая в цепочке)
pub fn advance_frame(mut frame: ResMut<SimulationFrame>) {
    frame.index += 1;
}
