//! Spatial Query Oracle — внешний коллаборатор (raycast + walkable surface)
//!
//! Ядро не знает, откуда берётся геометрия: физический движок, navmesh или
//! тестовая арена. Всё общение идёт через trait `SpatialQuery`, который
//! живёт в resource `SpatialOracle`.
//!
//! ## Collision layers:
//! - Layer 2 (0b10 = 2): Actors (персонажи, турели)
//! - Layer 3 (0b100 = 4): Environment (стены, укрытия, террейн)

use bevy::prelude::*;

pub mod arena;
pub mod navigation;

pub use arena::{ArenaBody, ArenaWorld, Obstacle};
pub use navigation::{NavigationOracle, Navigator, StraightLineNavigator};

/// Layer 2: Actors
pub const COLLISION_LAYER_ACTORS: u32 = 0b10;

/// Layer 3: Environment
pub const COLLISION_LAYER_ENVIRONMENT: u32 = 0b100;

/// Mask: Raycast для LOS check (Actors + Environment)
pub const COLLISION_MASK_RAYCAST_LOS: u32 = COLLISION_LAYER_ACTORS | COLLISION_LAYER_ENVIRONMENT;

/// Ближайшее попадание луча
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Нормаль поверхности в точке попадания
    pub normal: Vec3,
    /// Расстояние от начала луча
    pub distance: f32,
    /// Entity тела (None = статическая геометрия мира)
    pub collider: Option<Entity>,
    /// Collision layer тела
    pub layer: u32,
}

/// Категория препятствия на линии огня
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    /// Стена, укрытие, террейн
    World,
    /// Союзник стоит на линии огня
    Ally,
    /// Луч упёрся в саму цель — линия чистая
    Target,
    /// Чужое тело (нейтрал, другой враг)
    Other,
}

impl RayHit {
    /// Классифицировать попадание относительно конкретной цели
    pub fn classify(&self, target: Entity, is_ally: impl Fn(Entity) -> bool) -> ObstacleKind {
        match self.collider {
            None => ObstacleKind::World,
            Some(body) if body == target => ObstacleKind::Target,
            Some(body) if is_ally(body) => ObstacleKind::Ally,
            Some(_) if self.layer & COLLISION_LAYER_ENVIRONMENT != 0 => ObstacleKind::World,
            Some(_) => ObstacleKind::Other,
        }
    }
}

/// Контракт Spatial Query Oracle
///
/// Оба метода pure и синхронные.
pub trait SpatialQuery: Send + Sync {
    /// Ближайшее попадание на отрезке `from → to`, тела из `ignore` пропускаются
    fn raycast(&self, from: Vec3, to: Vec3, ignore: &[Entity], mask: u32) -> Option<RayHit>;

    /// Ближайшая точка walkable поверхности
    ///
    /// Может вернуть точку сколь угодно далеко от входной — вызывающий код
    /// обязан проверить дистанцию перед тем как доверять результату.
    fn nearest_walkable_point(&self, point: Vec3) -> Vec3;
}

/// Resource-обёртка для oracle (инжектится в системы)
#[derive(Resource)]
pub struct SpatialOracle(pub Box<dyn SpatialQuery>);

impl SpatialOracle {
    pub fn new(query: impl SpatialQuery + 'static) -> Self {
        Self(Box::new(query))
    }

    pub fn query(&self) -> &dyn SpatialQuery {
        self.0.as_ref()
    }
}

/// Чистая ли линия `from → point`, считая попадание в саму цель проходом
pub fn is_line_clear(
    spatial: &dyn SpatialQuery,
    from: Vec3,
    point: Vec3,
    target: Entity,
    ignore: &[Entity],
) -> bool {
    match spatial.raycast(from, point, ignore, COLLISION_MASK_RAYCAST_LOS) {
        None => true,
        Some(hit) => hit.collider == Some(target),
    }
}
