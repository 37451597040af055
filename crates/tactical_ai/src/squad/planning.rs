//! Combat planning для сквада: fallback chain
//!
//! cover search → formation → firing arc → direct assault.
//! Чистая функция над oracle + таблицей резерваций (таблица не меняется:
//! cover search работает на клоне, чтобы участники не заняли одну точку).

use bevy::prelude::*;

use super::components::CombatPlan;
use crate::config::TacticalConfig;
use crate::perception::TargetSnapshot;
use crate::spatial::SpatialQuery;
use crate::tactics::{
    formation_anchor, generate_firing_arc_positions, optimal_assignments,
    validate_candidate, ArcMember, Formation, PositionReservations, SearchRequest,
};

/// Результат планирования: позиция на каждого участника (None = идти в лоб)
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementPlan {
    pub plan: CombatPlan,
    /// В порядке `members`
    pub positions: Vec<(Entity, Option<Vec3>)>,
}

impl EngagementPlan {
    fn direct_assault(members: &[ArcMember]) -> Self {
        Self {
            plan: CombatPlan::DirectAssault,
            positions: members.iter().map(|m| (m.agent, None)).collect(),
        }
    }

    /// Только назначенные точки (для RequestPositionsForSquad)
    pub fn assigned(&self) -> Vec<(Entity, Vec3)> {
        self.positions
            .iter()
            .filter_map(|&(agent, point)| point.map(|p| (agent, p)))
            .collect()
    }
}

pub fn plan_engagement(
    spatial: &dyn SpatialQuery,
    members: &[ArcMember],
    target: &TargetSnapshot,
    formation: &Formation,
    reservations: &PositionReservations,
    config: &TacticalConfig,
) -> EngagementPlan {
    if members.is_empty() {
        return EngagementPlan::direct_assault(members);
    }

    let ignore: Vec<Entity> = members.iter().map(|m| m.agent).collect();

    if let Some(positions) = plan_cover(spatial, members, target, &ignore, reservations, config) {
        return EngagementPlan {
            plan: CombatPlan::Cover,
            positions,
        };
    }

    if let Some(positions) = formation_positions(spatial, members, target, formation, &ignore, config)
        .filter(|positions| !any_reserved(&points_of(positions), &ignore, reservations))
    {
        return EngagementPlan {
            plan: CombatPlan::Formation,
            positions,
        };
    }

    let arc: Vec<Vec3> = generate_firing_arc_positions(spatial, members, target, config)
        .into_iter()
        .map(|p| p.point)
        .collect();
    if arc.len() == members.len() && !any_reserved(&arc, &ignore, reservations) {
        return EngagementPlan {
            plan: CombatPlan::FiringArc,
            positions: assign(members, &arc),
        };
    }

    crate::logger::log_warning(&format!(
        "Squad plan: no positions around {:?} → direct assault",
        target.entity
    ));
    EngagementPlan::direct_assault(members)
}

/// Каждый участник ищет свою позицию (hybrid). Провал хотя бы одного — провал плана.
fn plan_cover(
    spatial: &dyn SpatialQuery,
    members: &[ArcMember],
    target: &TargetSnapshot,
    ignore: &[Entity],
    reservations: &PositionReservations,
    config: &TacticalConfig,
) -> Option<Vec<(Entity, Option<Vec3>)>> {
    let mut planning = reservations.clone();
    let mut positions = Vec::with_capacity(members.len());

    for member in members {
        let request = SearchRequest {
            agent: member.agent,
            position: member.position,
            offsets: member.offsets,
            target,
            radius: config.search_radius,
            step: config.search_step,
            ignore,
        };

        let found = config.search_strategy.find(spatial, &request, Some(&planning))?;
        planning.reserve(member.agent, found.point);
        positions.push((member.agent, Some(found.point)));
    }

    Some(positions)
}

/// Слоты формации на engagement_distance от цели, со стороны сквада
///
/// Сначала слоты раздаются (greedy), потом каждый проверяется офсетами
/// того участника, которому достался.
fn formation_positions(
    spatial: &dyn SpatialQuery,
    members: &[ArcMember],
    target: &TargetSnapshot,
    formation: &Formation,
    ignore: &[Entity],
    config: &TacticalConfig,
) -> Option<Vec<(Entity, Option<Vec3>)>> {
    let centroid = members.iter().map(|m| m.position).sum::<Vec3>() / members.len() as f32;
    let toward = {
        let flat = Vec3::new(centroid.x - target.position.x, 0.0, centroid.z - target.position.z);
        let dir = flat.normalize_or_zero();
        if dir == Vec3::ZERO {
            Vec3::Z
        } else {
            dir
        }
    };

    let anchor = formation_anchor(
        target.position + toward * config.engagement_distance,
        target.position,
    );

    let slots: Vec<Vec3> = formation
        .offsets(members.len())
        .into_iter()
        .map(|slot| anchor.transform_point(slot))
        .collect();

    assign(members, &slots)
        .into_iter()
        .zip(members)
        .map(|((agent, slot), member)| {
            let validated = validate_candidate(
                spatial,
                slot?,
                config.search_step,
                &member.offsets,
                target,
                ignore,
            )?;
            Some((agent, Some(validated.point)))
        })
        .collect()
}

fn points_of(positions: &[(Entity, Option<Vec3>)]) -> Vec<Vec3> {
    positions.iter().filter_map(|(_, p)| *p).collect()
}

fn any_reserved(points: &[Vec3], group: &[Entity], reservations: &PositionReservations) -> bool {
    points
        .iter()
        .any(|&point| reservations.is_reserved_by_others(point, group))
}

/// World-space точки → участники (greedy, порядок точек)
fn assign(members: &[ArcMember], points: &[Vec3]) -> Vec<(Entity, Option<Vec3>)> {
    let agents: Vec<(Entity, Vec3)> = members.iter().map(|m| (m.agent, m.position)).collect();
    let assignments = optimal_assignments(&agents, points, &Transform::IDENTITY);

    members
        .iter()
        .map(|m| {
            let point = assignments
                .iter()
                .find(|a| a.agent == m.agent)
                .map(|a| a.position);
            (m.agent, point)
        })
        .collect()
}
