//! Tactical Position Search — FindOptimalFiringPosition
//!
//! Два взаимозаменяемых варианта:
//! - Probing: фиксированный список горизонтальных направлений относительно
//!   observer → target, шагаем кольцами по `step` до `radius`
//! - Hybrid: сначала один луч weapon mount → цель; если попали в препятствие,
//!   сначала пробуем касательные к поверхности направления, потом probing
//!
//! Порядок проверки distance-major: кольцо k во всех направлениях, потом k+1.
//! Ближняя валидная точка всегда выигрывает у дальней, при равной дистанции
//! выигрывает более раннее направление.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::reservation::PositionReservations;
use crate::components::SensorOffsets;
use crate::perception::{first_visible_point, TargetSnapshot};
use crate::spatial::{SpatialQuery, COLLISION_MASK_RAYCAST_LOS};

/// Валидированная тактическая позиция (не персистится — считается и сразу потребляется)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TacticalPosition {
    /// Точка на walkable поверхности
    pub point: Vec3,
    /// Weapon mount в этой точке (лицом к цели)
    pub weapon_point: Vec3,
    /// Видимая с weapon mount точка цели
    pub visible_point: Vec3,
}

/// Кто ищет и в кого стреляем
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub agent: Entity,
    /// Текущая позиция агента (корень)
    pub position: Vec3,
    pub offsets: SensorOffsets,
    pub target: &'a TargetSnapshot,
    pub radius: f32,
    pub step: f32,
    /// Тела, которые не блокируют выстрел (сам агент, союзники)
    pub ignore: &'a [Entity],
}

impl SearchRequest<'_> {
    /// Максимум итераций на одно направление
    pub fn max_steps(&self) -> usize {
        if self.step <= 0.0 || self.radius <= 0.0 {
            return 0;
        }
        (self.radius / self.step).floor() as usize
    }

    /// Горизонтальное направление observer → target
    fn forward(&self) -> Vec3 {
        let flat = Vec3::new(
            self.target.position.x - self.position.x,
            0.0,
            self.target.position.z - self.position.z,
        );
        let forward = flat.normalize_or_zero();
        if forward == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            forward
        }
    }
}

/// Вариант поиска (выбирается в TacticalConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchStrategy {
    Probing,
    #[default]
    Hybrid,
}

impl SearchStrategy {
    pub fn find(
        self,
        spatial: &dyn SpatialQuery,
        request: &SearchRequest,
        reservations: Option<&PositionReservations>,
    ) -> Option<TacticalPosition> {
        match self {
            Self::Probing => find_by_probing(spatial, request, reservations),
            Self::Hybrid => find_hybrid(spatial, request, reservations),
        }
    }
}

/// Фиксированный приоритет: правый фланг, левый фланг, отход, сближение, две передние диагонали
pub fn probe_directions(forward: Vec3) -> [Vec3; 6] {
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    let left = -right;
    [
        right,
        left,
        -forward,
        forward,
        (forward + right).normalize_or_zero(),
        (forward + left).normalize_or_zero(),
    ]
}

/// Probing-вариант
pub fn find_by_probing(
    spatial: &dyn SpatialQuery,
    request: &SearchRequest,
    reservations: Option<&PositionReservations>,
) -> Option<TacticalPosition> {
    let directions = probe_directions(request.forward());
    let found = sweep(spatial, request, reservations, &directions);

    if found.is_none() {
        crate::logger::log_warning(&format!(
            "Search: {:?} probing exhausted (radius {:.1}, step {:.1})",
            request.agent, request.radius, request.step
        ));
    }
    found
}

/// Hybrid-вариант: касательные к препятствию первыми, потом probing
pub fn find_hybrid(
    spatial: &dyn SpatialQuery,
    request: &SearchRequest,
    reservations: Option<&PositionReservations>,
) -> Option<TacticalPosition> {
    let forward = request.forward();
    let origin = weapon_point_at(request.position, request.target.position, &request.offsets);
    let aim_point = request
        .target
        .sight_points
        .first()
        .copied()
        .unwrap_or(request.target.center);

    if let Some(hit) = spatial.raycast(origin, aim_point, &ignore_with_agent(request), COLLISION_MASK_RAYCAST_LOS) {
        if hit.collider != Some(request.target.entity) {
            let tangent = surface_tangent(hit.normal, forward);
            if let Some(found) = sweep(spatial, request, reservations, &[tangent, -tangent]) {
                return Some(found);
            }
        }
    }

    find_by_probing(spatial, request, reservations)
}

/// Горизонтальная касательная к поверхности по нормали попадания
///
/// Нормаль вертикальная (пол, крыша) → n × Y вырождается, берём n × forward.
pub fn surface_tangent(normal: Vec3, forward: Vec3) -> Vec3 {
    let flatten = |v: Vec3| Vec3::new(v.x, 0.0, v.z).normalize_or_zero();

    let tangent = flatten(normal.cross(Vec3::Y));
    if tangent != Vec3::ZERO {
        return tangent;
    }

    let fallback = flatten(normal.cross(forward));
    if fallback != Vec3::ZERO {
        return fallback;
    }
    forward.cross(Vec3::Y).normalize_or_zero()
}

/// Weapon mount в точке `at`, развёрнутый по yaw к цели
pub fn weapon_point_at(at: Vec3, target: Vec3, offsets: &SensorOffsets) -> Vec3 {
    let facing = Vec3::new(target.x, at.y, target.z);
    let transform = if facing.distance_squared(at) > f32::EPSILON {
        Transform::from_translation(at).looking_at(facing, Vec3::Y)
    } else {
        Transform::from_translation(at)
    };
    offsets.weapon_point(&transform)
}

/// Проверить одну точку-кандидат: snap на walkable + LoS с weapon mount
///
/// `max_snap` — если snap увёл точку дальше, значит кандидат вне walkable области.
pub fn validate_candidate(
    spatial: &dyn SpatialQuery,
    raw: Vec3,
    max_snap: f32,
    offsets: &SensorOffsets,
    target: &TargetSnapshot,
    ignore: &[Entity],
) -> Option<TacticalPosition> {
    let point = spatial.nearest_walkable_point(raw);
    if point.distance(raw) > max_snap {
        return None;
    }

    let weapon_point = weapon_point_at(point, target.position, offsets);
    let visible_point = first_visible_point(spatial, weapon_point, target, ignore)?;

    Some(TacticalPosition {
        point,
        weapon_point,
        visible_point,
    })
}

fn ignore_with_agent(request: &SearchRequest) -> Vec<Entity> {
    let mut ignore = Vec::with_capacity(request.ignore.len() + 1);
    ignore.push(request.agent);
    ignore.extend_from_slice(request.ignore);
    ignore
}

/// Distance-major обход: ≤ max_steps итераций на направление
fn sweep(
    spatial: &dyn SpatialQuery,
    request: &SearchRequest,
    reservations: Option<&PositionReservations>,
    directions: &[Vec3],
) -> Option<TacticalPosition> {
    let ignore = ignore_with_agent(request);

    for ring in 1..=request.max_steps() {
        let distance = ring as f32 * request.step;

        for direction in directions {
            if *direction == Vec3::ZERO {
                continue;
            }

            let raw = request.position + *direction * distance;
            let Some(candidate) = validate_candidate(
                spatial,
                raw,
                request.step,
                &request.offsets,
                request.target,
                &ignore,
            ) else {
                continue;
            };

            if reservations.is_some_and(|table| table.is_reserved(candidate.point, request.agent)) {
                continue;
            }

            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
