//! AI Events — граница ядра с внешними коллабораторами
//!
//! Trigger volume → SensorEvent (onTargetDetected / onTargetLost)
//! Damage/health коллаборатор → DamageTaken (onDamaged)
//! Attack state → WeaponFireIntent (баллистика/снаряды вне ядра)

use bevy::prelude::*;

/// События сенсора от trigger volume
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Враг вошёл в sensor volume
    TargetDetected {
        /// Entity наблюдателя (у кого сенсор)
        observer: Entity,
        /// Entity цели
        target: Entity,
    },

    /// Цель вышла из sensor volume
    TargetLost { observer: Entity, target: Entity },
}

/// Агент получил урон (HP уже списаны коллаборатором)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageTaken {
    pub agent: Entity,
    /// Кто стрелял (None = окружение, неизвестный источник)
    pub source: Option<Entity>,
    pub amount: u32,
    /// Откуда пришёл урон (точка для Investigate)
    pub source_position: Option<Vec3>,
}

/// Намерение выстрела/удара
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct WeaponFireIntent {
    pub shooter: Entity,
    pub target: Entity,
    pub aim_point: Vec3,
}
