//! Squad Position Allocator + формации
//!
//! `optimal_assignments` — greedy nearest-first matching. Это НЕ глобально
//! оптимальный min-cost matching (Hungarian): известная аппроксимация,
//! сохранённая намеренно, downstream поведение зависит от конкретных
//! назначений, включая tie-break по порядку итерации.

use bevy::prelude::*;

/// Назначение агент → позиция (world space)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub agent: Entity,
    pub position: Vec3,
}

/// GetOptimalAssignments
///
/// `positions` заданы в local space `anchor` (для уже world-space позиций —
/// `Transform::IDENTITY`). Итерация по позициям в порядке списка; каждой
/// позиции достаётся ближайший свободный агент (по квадрату дистанции),
/// при равенстве — более ранний в `agents`. Результат: min(agents, positions) пар.
pub fn optimal_assignments(
    agents: &[(Entity, Vec3)],
    positions: &[Vec3],
    anchor: &Transform,
) -> Vec<Assignment> {
    let mut free: Vec<(Entity, Vec3)> = agents.to_vec();
    let mut result = Vec::with_capacity(positions.len().min(agents.len()));

    for local in positions {
        if free.is_empty() {
            break;
        }

        let world = anchor.transform_point(*local);

        let mut best_index = 0;
        let mut best_distance = f32::INFINITY;
        for (index, (_, agent_position)) in free.iter().enumerate() {
            let distance = agent_position.distance_squared(world);
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }

        let (agent, _) = free.remove(best_index);
        result.push(Assignment {
            agent,
            position: world,
        });
    }

    result
}

/// Форма строя
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum FormationShape {
    /// Шеренга поперёк направления движения
    #[default]
    Line,
    /// Клин: лидер впереди, фланги уступом назад
    Wedge,
    /// Колонна друг за другом
    Column,
}

/// Формация: набор слотов в local space якоря (-Z = вперёд, +X = вправо)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct Formation {
    pub shape: FormationShape,
    pub spacing: f32,
}

impl Default for Formation {
    fn default() -> Self {
        Self {
            shape: FormationShape::Line,
            spacing: 2.5,
        }
    }
}

impl Formation {
    pub fn new(shape: FormationShape, spacing: f32) -> Self {
        Self { shape, spacing }
    }

    /// Local offsets для `count` слотов
    pub fn offsets(&self, count: usize) -> Vec<Vec3> {
        let spacing = self.spacing;

        match self.shape {
            FormationShape::Line => {
                let half = (count.saturating_sub(1)) as f32 * 0.5;
                (0..count)
                    .map(|i| Vec3::new((i as f32 - half) * spacing, 0.0, 0.0))
                    .collect()
            }
            FormationShape::Wedge => (0..count)
                .map(|i| {
                    if i == 0 {
                        return Vec3::ZERO;
                    }
                    let rank = i.div_ceil(2) as f32;
                    let side = if i % 2 == 1 { 1.0 } else { -1.0 };
                    Vec3::new(side * rank * spacing, 0.0, rank * spacing)
                })
                .collect(),
            FormationShape::Column => (0..count)
                .map(|i| Vec3::new(0.0, 0.0, i as f32 * spacing))
                .collect(),
        }
    }
}

/// Якорь формации: точка + разворот в сторону `facing` (только yaw)
pub fn formation_anchor(point: Vec3, facing: Vec3) -> Transform {
    let look = Vec3::new(facing.x, point.y, facing.z);
    if look.distance_squared(point) <= f32::EPSILON {
        return Transform::from_translation(point);
    }
    Transform::from_translation(point).looking_at(look, Vec3::Y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_distance(agents: &[(Entity, Vec3)], pairs: &[(Entity, Vec3)]) -> f32 {
        pairs
            .iter()
            .map(|(agent, position)| {
                let start = agents
                    .iter()
                    .find(|(e, _)| e == agent)
                    .map(|(_, p)| *p)
                    .unwrap_or(Vec3::ZERO);
                start.distance(*position)
            })
            .sum()
    }

    #[test]
    fn test_squad_of_three_formation_toward_distant_target() {
        let agents = [
            (Entity::from_raw(1), Vec3::new(-3.0, 0.0, 0.0)),
            (Entity::from_raw(2), Vec3::new(0.0, 0.0, 0.0)),
            (Entity::from_raw(3), Vec3::new(3.0, 0.0, 0.0)),
        ];
        let target = Vec3::new(0.0, 0.0, 30.0);
        let anchor = formation_anchor(Vec3::new(0.0, 0.0, 15.0), target);
        let offsets = Formation::new(FormationShape::Line, 2.5).offsets(3);

        let assignments = optimal_assignments(&agents, &offsets, &anchor);
        assert_eq!(assignments.len(), 3);

        let mut seen_agents: Vec<Entity> = assignments.iter().map(|a| a.agent).collect();
        seen_agents.sort();
        seen_agents.dedup();
        assert_eq!(seen_agents.len(), 3);
        for (i, a) in assignments.iter().enumerate() {
            for b in &assignments[i + 1..] {
                assert!(a.position.distance(b.position) > 1.0);
            }
        }

        let greedy: Vec<(Entity, Vec3)> = assignments.iter().map(|a| (a.agent, a.position)).collect();
        let greedy_sum = total_distance(&agents, &greedy);

        let world: Vec<Vec3> = offsets.iter().map(|o| anchor.transform_point(*o)).collect();
        let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for permutation in permutations {
            let pairs: Vec<(Entity, Vec3)> = permutation
                .iter()
                .enumerate()
                .map(|(slot, &agent)| (agents[agent].0, world[slot]))
                .collect();
            assert!(greedy_sum <= total_distance(&agents, &pairs) + 1e-4);
        }
    }

    #[test]
    fn test_greedy_is_a_known_approximation() {
        // Классический контрпример: первая позиция "крадёт" агента,
        // который идеально подходил ко второй
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let agents = [(a, Vec3::new(0.0, 0.0, 0.0)), (b, Vec3::new(10.0, 0.0, 0.0))];
        let positions = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)];

        let assignments = optimal_assignments(&agents, &positions, &Transform::IDENTITY);
        assert_eq!(assignments[0].agent, a);
        assert_eq!(assignments[1].agent, b);
        // Greedy: 1 + 11 = 12, оптимум: 9 + 1 = 10
    }

    #[test]
    fn test_tie_break_by_agent_order() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let agents = [(a, Vec3::new(-1.0, 0.0, 0.0)), (b, Vec3::new(1.0, 0.0, 0.0))];

        let assignments = optimal_assignments(&agents, &[Vec3::ZERO], &Transform::IDENTITY);
        assert_eq!(assignments, vec![Assignment { agent: a, position: Vec3::ZERO }]);
    }

    #[test]
    fn test_more_positions_than_agents() {
        let agents = [(Entity::from_raw(1), Vec3::ZERO)];
        let positions = Formation::default().offsets(4);
        assert_eq!(optimal_assignments(&agents, &positions, &Transform::IDENTITY).len(), 1);
        assert!(optimal_assignments(&[], &positions, &Transform::IDENTITY).is_empty());
    }

    #[test]
    fn test_formation_shapes() {
        let line = Formation::new(FormationShape::Line, 2.0).offsets(3);
        assert_eq!(line, vec![Vec3::new(-2.0, 0.0, 0.0), Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);

        let wedge = Formation::new(FormationShape::Wedge, 1.0).offsets(3);
        assert_eq!(wedge[0], Vec3::ZERO);
        assert_eq!(wedge[1], Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(wedge[2], Vec3::new(-1.0, 0.0, 1.0));

        let column = Formation::new(FormationShape::Column, 3.0).offsets(2);
        assert_eq!(column[1], Vec3::new(0.0, 0.0, 3.0));
    }
}
