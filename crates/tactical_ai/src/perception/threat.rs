//! Threat Evaluator — (observer, candidate) → приоритет цели
//!
//! score > 0 — чем больше, тем опаснее; `INELIGIBLE` — цель нельзя выбрать
//! (не видна, мертва, своя). Ветвление идёт по capability снимка
//! (turret / operating_turret), а не по конкретному типу entity.

use bevy::prelude::*;

use super::line_of_sight::{LineOfSightCache, Visibility};
use super::registry::{TargetRegistry, TargetSnapshot};
use crate::config::TacticalConfig;

/// Sentinel: цель не подходит
pub const INELIGIBLE: f32 = -1.0;

/// Минимальный d² (цель вплотную не даёт деления на ноль)
const MIN_DISTANCE_SQUARED: f32 = 0.01;

/// Кто оценивает
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub entity: Entity,
    pub faction_id: u64,
    /// World-space точка глаз
    pub eye: Vec3,
}

/// Результат оценки
///
/// `target` может отличаться от кандидата: оператор турели перенаправляется на турель.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatScore {
    pub target: Entity,
    pub score: f32,
}

impl ThreatScore {
    fn ineligible(target: Entity) -> Self {
        Self {
            target,
            score: INELIGIBLE,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.score >= 0.0
    }
}

/// Оценить одного кандидата
pub fn score_target(
    observer: &Observer,
    candidate: &TargetSnapshot,
    registry: &TargetRegistry,
    visibility: &Visibility,
    cache: &mut LineOfSightCache,
    config: &TacticalConfig,
) -> ThreatScore {
    if !candidate.is_alive() || candidate.faction_id == observer.faction_id {
        return ThreatScore::ineligible(candidate.entity);
    }

    // 1. LoS с глаз на любую sight point (или центр)
    if cache
        .first_visible_point(visibility, observer.eye, candidate, &[observer.entity])
        .is_none()
    {
        return ThreatScore::ineligible(candidate.entity);
    }

    // 2-3. Оператор турели → оцениваем турель; сама турель → turret multiplier
    // (автономная турель с оператором всё равно "просто турель")
    let (subject, multiplier) = match candidate
        .operating_turret
        .and_then(|turret| registry.live(turret))
    {
        Some(turret) => (turret, config.occupied_turret_multiplier),
        None => match candidate.turret {
            Some(info) if !info.autonomous && info.occupant.is_some_and(|o| registry.is_live(o)) => {
                (candidate, config.occupied_turret_multiplier)
            }
            Some(_) => (candidate, config.turret_multiplier),
            None => (candidate, 1.0),
        },
    };

    // 4. base * 1/(d²)^(w/2) * multiplier, потом бонус за раненую цель
    let distance_squared = observer
        .eye
        .distance_squared(subject.center)
        .max(MIN_DISTANCE_SQUARED);
    let falloff = distance_squared.powf(config.distance_weight * 0.5).recip();
    let base = subject.base_threat * falloff * multiplier;

    let wounded = 1.0 - subject.health.fraction().clamp(0.0, 1.0);
    let score = base * (1.0 + config.wounded_bonus * wounded);

    ThreatScore {
        target: subject.entity,
        score,
    }
}

/// Лучшая цель из списка кандидатов
///
/// Tie-break: побеждает первый встреченный (строгое `>`), порядок кандидатов
/// значим. Мёртвые/despawned кандидаты пропускаются. None если все ineligible.
pub fn best_target(
    observer: &Observer,
    candidates: &[Entity],
    registry: &TargetRegistry,
    visibility: &Visibility,
    cache: &mut LineOfSightCache,
    config: &TacticalConfig,
) -> Option<ThreatScore> {
    let mut best: Option<ThreatScore> = None;

    for &candidate in candidates {
        let Some(snapshot) = registry.live(candidate) else {
            continue;
        };

        let scored = score_target(observer, snapshot, registry, visibility, cache, config);
        if !scored.is_eligible() {
            continue;
        }

        if best.is_none_or(|current| scored.score > current.score) {
            best = Some(scored);
        }
    }

    best
}

#[cfg(test)]
#[path = "threat_tests.rs"]
mod tests;
