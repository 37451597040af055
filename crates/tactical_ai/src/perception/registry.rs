//! TargetRegistry — per-tick snapshot всех потенциальных целей
//!
//! Любая ссылка на цель (CurrentTarget, TargetSensor, Squad target) может
//! протухнуть между тиками: цель убили или despawn'нули чужие системы.
//! Поэтому все обращения идут через `TargetRegistry::live`, который
//! ре-валидирует liveness прямо перед использованием.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::components::{Actor, Health, OperatingTurret, SightPoints, Targetable, Turret};
use crate::config::TacticalConfig;

/// Высота "центра" цели над корнем (fallback точка для LoS без sight points)
pub const TARGET_CENTER_HEIGHT: f32 = 1.0;

/// Турельная часть цели
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurretInfo {
    pub occupant: Option<Entity>,
    pub autonomous: bool,
}

/// Снимок цели: capability set {position, faction, health, sight points?, turret?, operator?}
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSnapshot {
    pub entity: Entity,
    /// Корень (ноги) цели
    pub position: Vec3,
    /// Центр масс — fallback для LoS
    pub center: Vec3,
    pub faction_id: u64,
    pub health: Health,
    /// World-space sight points в порядке приоритета (пусто = только центр)
    pub sight_points: Vec<Vec3>,
    /// Some если цель — турель
    pub turret: Option<TurretInfo>,
    /// Some если цель — персонаж за турелью
    pub operating_turret: Option<Entity>,
    pub base_threat: f32,
}

impl TargetSnapshot {
    /// Минимальный снимок персонажа (для тестов и ручной сборки)
    pub fn character(entity: Entity, position: Vec3, faction_id: u64, health: Health) -> Self {
        Self {
            entity,
            position,
            center: position + Vec3::Y * TARGET_CENTER_HEIGHT,
            faction_id,
            health,
            sight_points: Vec::new(),
            turret: None,
            operating_turret: None,
            base_threat: 1.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }
}

/// Resource: снимок целей текущего тика
#[derive(Resource, Debug, Default, Clone)]
pub struct TargetRegistry {
    entries: HashMap<Entity, TargetSnapshot>,
}

impl TargetRegistry {
    pub fn insert(&mut self, snapshot: TargetSnapshot) {
        self.entries.insert(snapshot.entity, snapshot);
    }

    pub fn remove(&mut self, entity: Entity) -> Option<TargetSnapshot> {
        self.entries.remove(&entity)
    }

    /// Снимок без проверки liveness (мёртвые тоже)
    pub fn get(&self, entity: Entity) -> Option<&TargetSnapshot> {
        self.entries.get(&entity)
    }

    /// Снимок только если entity существует И жива
    pub fn live(&self, entity: Entity) -> Option<&TargetSnapshot> {
        self.entries.get(&entity).filter(|snapshot| snapshot.is_alive())
    }

    /// Живая цель враждебной фракции
    pub fn live_hostile(&self, entity: Entity, observer_faction: u64) -> Option<&TargetSnapshot> {
        self.live(entity)
            .filter(|snapshot| snapshot.faction_id != observer_faction)
    }

    pub fn is_live(&self, entity: Entity) -> bool {
        self.live(entity).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Система: пересобрать TargetRegistry из ECS (первая в тике)
pub fn refresh_target_registry(
    mut registry: ResMut<TargetRegistry>,
    config: Res<TacticalConfig>,
    actors: Query<(
        Entity,
        &Actor,
        &Health,
        &Transform,
        Option<&SightPoints>,
        Option<&Turret>,
        Option<&OperatingTurret>,
        Option<&Targetable>,
    )>,
) {
    registry.entries.clear();

    for (entity, actor, health, transform, sight_points, turret, operating, targetable) in actors.iter() {
        let sight_points = sight_points
            .map(|points| {
                points
                    .offsets
                    .iter()
                    .map(|offset| transform.transform_point(*offset))
                    .collect()
            })
            .unwrap_or_default();

        registry.insert(TargetSnapshot {
            entity,
            position: transform.translation,
            center: transform.translation + Vec3::Y * TARGET_CENTER_HEIGHT,
            faction_id: actor.faction_id,
            health: *health,
            sight_points,
            turret: turret.map(|t| TurretInfo {
                occupant: t.occupant,
                autonomous: t.autonomous,
            }),
            operating_turret: operating.map(|o| o.0),
            base_threat: targetable
                .map(|t| t.base_threat)
                .unwrap_or(config.default_base_threat),
        });
    }
}
