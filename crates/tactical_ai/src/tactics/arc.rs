//! GenerateFiringArcPositions — дуга позиций вокруг цели (squad-level)
//!
//! Дуга центрирована на направлении цель → центроид сквада, раскрыта на
//! `firing_arc_spread`. Каждая точка независимо проходит тот же тест, что и
//! probing (snap на walkable + LoS с weapon mount). Возвращаются только
//! валидные; если их меньше чем участников — частичный провал, решает вызывающий.

use bevy::prelude::*;

use super::search::{validate_candidate, TacticalPosition};
use crate::components::SensorOffsets;
use crate::config::TacticalConfig;
use crate::perception::TargetSnapshot;
use crate::spatial::SpatialQuery;

/// Участник сквада для генерации дуги
#[derive(Debug, Clone, Copy)]
pub struct ArcMember {
    pub agent: Entity,
    pub position: Vec3,
    pub offsets: SensorOffsets,
}

pub fn generate_firing_arc_positions(
    spatial: &dyn SpatialQuery,
    members: &[ArcMember],
    target: &TargetSnapshot,
    config: &TacticalConfig,
) -> Vec<TacticalPosition> {
    if members.is_empty() {
        return Vec::new();
    }

    let centroid = members.iter().map(|m| m.position).sum::<Vec3>() / members.len() as f32;
    let facing = {
        let flat = Vec3::new(centroid.x - target.position.x, 0.0, centroid.z - target.position.z);
        let dir = flat.normalize_or_zero();
        if dir == Vec3::ZERO {
            Vec3::Z
        } else {
            dir
        }
    };

    let ignore: Vec<Entity> = members.iter().map(|m| m.agent).collect();
    let count = members.len();

    let mut positions = Vec::with_capacity(count);
    for (index, member) in members.iter().enumerate() {
        let angle = if count == 1 {
            0.0
        } else {
            -config.firing_arc_spread * 0.5
                + config.firing_arc_spread * index as f32 / (count - 1) as f32
        };

        let direction = Quat::from_rotation_y(angle) * facing;
        let raw = target.position + direction * config.firing_arc_radius;

        if let Some(position) =
            validate_candidate(spatial, raw, config.search_step, &member.offsets, target, &ignore)
        {
            positions.push(position);
        }
    }

    if positions.len() < count {
        crate::logger::log_warning(&format!(
            "Firing arc: only {}/{} valid positions around {:?}",
            positions.len(),
            count,
            target.entity
        ));
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Health;
    use crate::spatial::{is_line_clear, ArenaWorld, Obstacle};

    fn members(count: u32) -> Vec<ArcMember> {
        (0..count)
            .map(|i| ArcMember {
                agent: Entity::from_raw(i + 1),
                position: Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.0),
                offsets: SensorOffsets::default(),
            })
            .collect()
    }

    #[test]
    fn test_arc_faces_squad_at_configured_radius() {
        let arena = ArenaWorld::open_field();
        let target = TargetSnapshot::character(Entity::from_raw(50), Vec3::new(0.0, 0.0, 30.0), 2, Health::new(100));
        let config = TacticalConfig::default();

        let positions = generate_firing_arc_positions(&arena, &members(3), &target, &config);
        assert_eq!(positions.len(), 3);

        for position in &positions {
            approx::assert_relative_eq!(
                position.point.distance(target.position),
                config.firing_arc_radius,
                epsilon = 1e-3
            );
            // Сторона сквада (z < 30)
            assert!(position.point.z < target.position.z);
            assert!(is_line_clear(&arena, position.weapon_point, position.visible_point, target.entity, &[]));
        }

        // Средняя позиция ровно на оси цель → центроид
        assert!(positions[1].point.distance(Vec3::new(0.0, 0.0, 18.0)) < 1e-3);
    }

    #[test]
    fn test_arc_partial_failure_returns_only_valid() {
        // Стена закрывает центр дуги
        let arena = ArenaWorld::open_field().with_obstacle(Obstacle::new(
            Vec3::new(-2.0, 0.0, 20.0),
            Vec3::new(2.0, 3.0, 21.0),
        ));
        let target = TargetSnapshot::character(Entity::from_raw(50), Vec3::new(0.0, 0.0, 30.0), 2, Health::new(100));

        let positions = generate_firing_arc_positions(&arena, &members(3), &target, &TacticalConfig::default());
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_empty_squad_has_no_arc() {
        let arena = ArenaWorld::open_field();
        let target = TargetSnapshot::character(Entity::from_raw(50), Vec3::ZERO, 2, Health::new(100));
        assert!(generate_firing_arc_positions(&arena, &[], &target, &TacticalConfig::default()).is_empty());
    }
}
