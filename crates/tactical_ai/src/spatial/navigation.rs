//! Navigation oracle — movement layer (black-box pathfinding)
//!
//! Ядро только выставляет destination и опрашивает следующую точку пути.
//! Как путь строится (navmesh, grid, прямая) — забота реализации.

use bevy::prelude::*;
use std::collections::HashMap;

/// Контракт movement-layer oracle
pub trait Navigator: Send + Sync {
    /// Выставить destination (перезаписывает предыдущий путь)
    fn set_destination(&mut self, agent: Entity, from: Vec3, destination: Vec3);

    /// Следующая точка пути (None = пути нет)
    fn next_path_point(&self, agent: Entity, position: Vec3) -> Option<Vec3>;

    /// Путь пройден (или его нет)
    fn is_path_finished(&self, agent: Entity, position: Vec3) -> bool;

    /// Сбросить путь (cancellation: stale order не должен пережить смену state)
    fn stop(&mut self, agent: Entity);
}

/// Resource-обёртка для Navigator
#[derive(Resource)]
pub struct NavigationOracle(pub Box<dyn Navigator>);

impl NavigationOracle {
    pub fn new(navigator: impl Navigator + 'static) -> Self {
        Self(Box::new(navigator))
    }
}

/// Простейший Navigator: идём по прямой к destination
///
/// Для тестов и headless demo. Препятствия не обходит.
#[derive(Debug, Default, Clone)]
pub struct StraightLineNavigator {
    destinations: HashMap<Entity, Vec3>,
}

const PATH_EPSILON: f32 = 0.05;

impl StraightLineNavigator {
    pub fn destination(&self, agent: Entity) -> Option<Vec3> {
        self.destinations.get(&agent).copied()
    }
}

impl Navigator for StraightLineNavigator {
    fn set_destination(&mut self, agent: Entity, _from: Vec3, destination: Vec3) {
        self.destinations.insert(agent, destination);
    }

    fn next_path_point(&self, agent: Entity, position: Vec3) -> Option<Vec3> {
        self.destinations
            .get(&agent)
            .copied()
            .filter(|destination| destination.distance(position) > PATH_EPSILON)
    }

    fn is_path_finished(&self, agent: Entity, position: Vec3) -> bool {
        self.next_path_point(agent, position).is_none()
    }

    fn stop(&mut self, agent: Entity) {
        self.destinations.remove(&agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_lifecycle() {
        let agent = Entity::from_raw(1);
        let mut nav = StraightLineNavigator::default();
        assert!(nav.is_path_finished(agent, Vec3::ZERO));

        nav.set_destination(agent, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(nav.next_path_point(agent, Vec3::ZERO), Some(Vec3::new(4.0, 0.0, 0.0)));
        assert!(!nav.is_path_finished(agent, Vec3::ZERO));
        assert!(nav.is_path_finished(agent, Vec3::new(4.0, 0.0, 0.01)));

        nav.stop(agent);
        assert_eq!(nav.destination(agent), None);
    }
}
