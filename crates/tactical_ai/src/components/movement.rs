//! Movement компоненты: команды перемещения, состояние навигации, look-at

use bevy::prelude::*;

/// Команда движения для актора (выполняется через navigation oracle)
///
/// Архитектура:
/// - AI state machines пишут MovementCommand (high-level intent)
/// - `execute_movement` читает и конвертирует в destination для Navigator
/// - Navigator отдаёт следующую точку пути, система двигает Transform
#[derive(Component, Debug, Clone, PartialEq, Default)]
pub enum MovementCommand {
    /// Стоять на месте (не трогать destination)
    #[default]
    Idle,
    /// Двигаться к позиции (world coordinates)
    MoveToPosition { target: Vec3 },
    /// Следовать за entity (обновлять destination каждый tick)
    FollowEntity { target: Entity },
    /// Остановиться немедленно (сбросить путь)
    Stop,
}

impl MovementCommand {
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::MoveToPosition { .. } | Self::FollowEntity { .. })
    }
}

/// Дистанция по XZ (высота не учитывается: walkable snap опускает точки на пол)
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

/// Состояние навигации актора
///
/// FollowEntity сравнивает destination с позицией цели и пересчитывает путь.
#[derive(Component, Default, Clone, Debug)]
pub struct NavigationState {
    /// Текущий destination, отданный Navigator
    pub destination: Option<Vec3>,
}

impl NavigationState {
    pub fn reset(&mut self) {
        self.destination = None;
    }
}

/// Скорость движения актора (метры/сек)
#[derive(Component, Clone, Copy, Debug)]
pub struct MovementSpeed {
    pub speed: f32,
}

impl Default for MovementSpeed {
    fn default() -> Self {
        Self { speed: 3.0 }
    }
}

/// Navigation agent — коллаборатор движения
///
/// Без этого компонента агент не может ходить (capability movement отключается).
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct NavigationAgent;

/// Look controller: куда смотрит агент
///
/// Attack/Pursuit пишут сюда видимую точку цели (из LoS cache),
/// `execute_movement` поворачивает Transform по yaw.
#[derive(Component, Default, Clone, Copy, Debug, PartialEq)]
pub struct LookAt {
    pub point: Option<Vec3>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_moving() {
        assert!(MovementCommand::MoveToPosition { target: Vec3::X }.is_moving());
        assert!(MovementCommand::FollowEntity { target: Entity::from_raw(1) }.is_moving());
        assert!(!MovementCommand::Stop.is_moving());
        assert!(!MovementCommand::default().is_moving());
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        assert_eq!(horizontal_distance(Vec3::new(0.0, 5.0, 0.0), Vec3::new(3.0, 0.0, 4.0)), 5.0);
    }
}
