//! Базовые компоненты акторов: Actor, Health, цели и турели

use bevy::prelude::*;

/// Актор (NPC, игрок, турель) — всё что имеет фракцию и может быть целью
///
/// Автоматически добавляет Health и Transform через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health, Transform)]
pub struct Actor {
    /// Stable ID фракции
    pub faction_id: u64,
}

impl Actor {
    pub fn new(faction_id: u64) -> Self {
        Self { faction_id }
    }

    pub fn is_hostile_to(&self, other: &Actor) -> bool {
        self.faction_id != other.faction_id
    }
}

/// Здоровье актора (numeric contract от damage/health коллаборатора)
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100) // Default 100 HP
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn with_current(max: u32, current: u32) -> Self {
        Self {
            current: current.min(max),
            max,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Доля здоровья 0.0..=1.0 (max == 0 считается мёртвым)
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        self.current as f32 / self.max as f32
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = (self.current + amount).min(self.max);
    }
}

/// Параметры цели для Threat Evaluator
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Targetable {
    /// Базовая ценность цели (умножается на distance/priority/wounded факторы)
    pub base_threat: f32,
}

impl Default for Targetable {
    fn default() -> Self {
        Self { base_threat: 1.0 }
    }
}

/// Дискретные точки видимости на цели (local offsets, порядок = приоритет)
///
/// Голова, торс, ноги и т.п. Если компонента нет — LoS проверяется по центру.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct SightPoints {
    pub offsets: Vec<Vec3>,
}

impl SightPoints {
    pub fn new(offsets: impl Into<Vec<Vec3>>) -> Self {
        Self {
            offsets: offsets.into(),
        }
    }

    /// Стандартный гуманоид: голова → грудь → таз
    pub fn humanoid() -> Self {
        Self::new(vec![
            Vec3::new(0.0, 1.7, 0.0),
            Vec3::new(0.0, 1.3, 0.0),
            Vec3::new(0.0, 0.9, 0.0),
        ])
    }
}

/// Турель (emplacement)
///
/// `occupant` — персонаж, который ей управляет. Пустая или автономная турель
/// оценивается с отдельным (меньшим) priority multiplier.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct Turret {
    pub occupant: Option<Entity>,
    pub autonomous: bool,
}

/// Маркер: персонаж сейчас управляет турелью
///
/// Threat Evaluator перенаправляет оценку на саму турель.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct OperatingTurret(pub Entity);

/// Точки сенсора и оружия относительно корня агента (local space)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SensorOffsets {
    /// Глаза (origin для threat evaluation и look-at)
    pub eye: Vec3,
    /// Ствол/weapon mount (origin для firing position проверок)
    pub weapon: Vec3,
}

impl Default for SensorOffsets {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.6, 0.0),
            weapon: Vec3::new(0.3, 1.4, 0.0),
        }
    }
}

impl SensorOffsets {
    pub fn eye_point(&self, transform: &Transform) -> Vec3 {
        transform.transform_point(self.eye)
    }

    pub fn weapon_point(&self, transform: &Transform) -> Vec3 {
        transform.transform_point(self.weapon)
    }
}
