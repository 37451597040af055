//! Line-of-Sight helpers + per-agent LoS cache
//!
//! `first_visible_point` вызывается из нескольких независимых мест в одном
//! тике (threat evaluation, look-at, сквадовое планирование), поэтому
//! результат мемоизируется на агенте: одна запись на цель, валидна пока
//! совпадает frame index и ни observer, ни цель не сдвинулись дальше
//! `los_invalidation_distance`.

use bevy::prelude::*;
use std::collections::HashMap;

use super::registry::TargetSnapshot;
use crate::spatial::{is_line_clear, SpatialQuery};

/// Первая видимая точка цели с позиции `observer_point`
///
/// Sight points проверяются в фиксированном порядке приоритета; если их нет —
/// fallback на центр цели. None = цель не видна ни в одной точке.
pub fn first_visible_point(
    spatial: &dyn SpatialQuery,
    observer_point: Vec3,
    target: &TargetSnapshot,
    ignore: &[Entity],
) -> Option<Vec3> {
    if target.sight_points.is_empty() {
        return is_line_clear(spatial, observer_point, target.center, target.entity, ignore)
            .then_some(target.center);
    }

    target
        .sight_points
        .iter()
        .copied()
        .find(|point| is_line_clear(spatial, observer_point, *point, target.entity, ignore))
}

/// Всё что нужно для (кэшированной) проверки видимости в текущем тике
#[derive(Clone, Copy)]
pub struct Visibility<'a> {
    pub spatial: &'a dyn SpatialQuery,
    pub frame: u64,
    pub invalidation_distance: f32,
}

/// Одна запись кэша
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LosCacheEntry {
    pub frame: u64,
    pub observer_position: Vec3,
    pub target_position: Vec3,
    pub visible_point: Option<Vec3>,
}

impl LosCacheEntry {
    fn is_fresh(&self, frame: u64, observer: Vec3, target: Vec3, threshold: f32) -> bool {
        self.frame == frame
            && self.observer_position.distance(observer) <= threshold
            && self.target_position.distance(target) <= threshold
    }
}

/// Per-agent LoS cache (keyed by target entity)
#[derive(Component, Debug, Default, Clone)]
pub struct LineOfSightCache {
    entries: HashMap<Entity, LosCacheEntry>,
    hits: u64,
    misses: u64,
}

impl LineOfSightCache {
    /// Кэшированный `first_visible_point`
    pub fn first_visible_point(
        &mut self,
        visibility: &Visibility,
        observer_point: Vec3,
        target: &TargetSnapshot,
        ignore: &[Entity],
    ) -> Option<Vec3> {
        if let Some(entry) = self.entries.get(&target.entity) {
            if entry.is_fresh(
                visibility.frame,
                observer_point,
                target.position,
                visibility.invalidation_distance,
            ) {
                self.hits += 1;
                return entry.visible_point;
            }
        }

        self.misses += 1;
        let visible_point = first_visible_point(visibility.spatial, observer_point, target, ignore);
        self.entries.insert(
            target.entity,
            LosCacheEntry {
                frame: visibility.frame,
                observer_position: observer_point,
                target_position: target.position,
                visible_point,
            },
        );
        visible_point
    }

    pub fn entry(&self, target: Entity) -> Option<&LosCacheEntry> {
        self.entries.get(&target)
    }

    pub fn invalidate(&mut self, target: Entity) {
        self.entries.remove(&target);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Выкинуть записи прошлых кадров (память не растёт бесконечно)
    pub fn retain_frame(&mut self, frame: u64) {
        self.entries.retain(|_, entry| entry.frame == frame);
    }

    /// (hits, misses) — для debug overlay и тестов
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
