//! Agent FSM components (state machine, config, capabilities, pending inputs).

use bevy::prelude::*;

use crate::components::{
    Actor, LookAt, MovementCommand, MovementSpeed, NavigationState, SensorOffsets,
};
use crate::config::{non_negative, positive};
use crate::error::ConfigError;
use crate::perception::{CurrentTarget, LineOfSightCache};

/// Agent FSM состояния (Enter / Update / Exit в `ai::systems::fsm`)
///
/// Все "ожидания" — убывающие таймеры, никаких блокирующих wait.
#[derive(Component, Debug, Clone, PartialEq)]
pub enum AgentState {
    /// Блуждание вокруг home: дойти до случайной точки, подождать, повторить
    Patrol {
        /// Сколько ещё ждать до следующей точки (секунды)
        wait_timer: f32,
        /// Текущая patrol точка (None = ждём)
        destination: Option<Vec3>,
    },

    /// Проход по фиксированному маршруту (PatrolRoute)
    PathFollowing {
        index: usize,
        /// true = вперёд по маршруту, false = обратно (ping-pong)
        forward: bool,
    },

    /// Бой: движение и кулдауны отданы CombatBehavior стратегии
    Attack { target: Entity },

    /// LoS потерян — идём к последней известной позиции цели
    Pursuit {
        target: Entity,
        last_known: Vec3,
        /// Сдаёмся когда таймер истёк
        timer: f32,
    },

    /// Идём к источнику урона
    Investigate { point: Vec3, timer: f32 },

    /// Повышенная бдительность после боя, стоим и озираемся
    Vigilance { timer: f32 },

    /// Приказ сквада: дойти до точки и держать её
    Regroup { point: Vec3 },

    /// HP == 0, AI отключен
    Dead,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Patrol {
            wait_timer: 0.0,
            destination: None,
        }
    }
}

impl AgentState {
    /// Короткое имя для логов переходов
    pub fn name(&self) -> &'static str {
        match self {
            Self::Patrol { .. } => "Patrol",
            Self::PathFollowing { .. } => "PathFollowing",
            Self::Attack { .. } => "Attack",
            Self::Pursuit { .. } => "Pursuit",
            Self::Investigate { .. } => "Investigate",
            Self::Vigilance { .. } => "Vigilance",
            Self::Regroup { .. } => "Regroup",
            Self::Dead => "Dead",
        }
    }

    /// Активный бой (Attack или Pursuit)
    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Attack { .. } | Self::Pursuit { .. })
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// Поведение "по умолчанию" — выбирается ОДИН раз при инициализации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultBehavior {
    #[default]
    Patrol,
    PathFollowing,
    /// Участник сквада: после боя держит позицию и ждёт приказов
    SquadControlled,
}

/// Режим прохода маршрута
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum PathMode {
    /// Patrol-миссия: разворот на концах маршрута
    #[default]
    PingPong,
    /// Assault-миссия: остановка на последней точке
    StopAtEnd,
}

/// Маршрут агента (waypoints неизменяемы после загрузки)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct PatrolRoute {
    pub waypoints: Vec<Vec3>,
    pub mode: PathMode,
}

impl PatrolRoute {
    pub fn new(waypoints: impl Into<Vec<Vec3>>, mode: PathMode) -> Self {
        Self {
            waypoints: waypoints.into(),
            mode,
        }
    }

    /// Следующий индекс после прибытия в `index`. None = маршрут закончен (StopAtEnd)
    pub fn advance(&self, index: usize, forward: bool) -> Option<(usize, bool)> {
        let len = self.waypoints.len();
        if len <= 1 {
            return None;
        }
        let last = len - 1;

        match (self.mode, forward) {
            (_, true) if index < last => Some((index + 1, true)),
            (PathMode::StopAtEnd, true) => None,
            (PathMode::PingPong, true) => Some((last - 1, false)),
            (_, false) if index > 0 => Some((index - 1, false)),
            (_, false) => Some((1, true)),
        }
    }
}

/// Приказ от сквада (применяется FSM в начале тика)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentOrder {
    /// Атаковать цель, опционально с назначенной позиции
    Engage {
        target: Entity,
        position: Option<Vec3>,
    },
    /// Дойти до точки (формация, путь сквада)
    MoveTo { point: Vec3 },
    /// Выйти из боя и держать позицию
    Disengage,
}

/// Урон, ожидающий обработки FSM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingDamage {
    pub source: Option<Entity>,
    pub point: Vec3,
}

/// Главный компонент агента
///
/// Автоматически добавляет FSM state, config, perception и movement компоненты.
#[derive(Component, Debug, Clone)]
#[require(
    Actor,
    AgentState,
    AgentConfig,
    AgentCapabilities,
    CurrentTarget,
    LineOfSightCache,
    MovementCommand,
    NavigationState,
    MovementSpeed,
    LookAt,
    SensorOffsets
)]
pub struct Agent {
    /// Точка спавна (центр Patrol)
    pub home: Vec3,
    pub default_behavior: DefaultBehavior,
    /// Прогресс по PatrolRoute (переживает бой)
    pub route_progress: (usize, bool),
    /// Назначенная сквадом/поиском позиция для боя
    pub assigned_position: Option<Vec3>,
    /// PositionReached уже отправлен для assigned_position
    pub position_reported: bool,
    /// Линия огня закрыта, новая позиция уже запрошена
    pub reposition_requested: bool,
    pub pending_damage: Option<PendingDamage>,
    pub pending_order: Option<AgentOrder>,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            home: Vec3::ZERO,
            default_behavior: DefaultBehavior::Patrol,
            route_progress: (0, true),
            assigned_position: None,
            position_reported: false,
            reposition_requested: false,
            pending_damage: None,
            pending_order: None,
        }
    }
}

impl Agent {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-agent tuning
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct AgentConfig {
    /// Patrol: радиус блуждания вокруг home (метры)
    pub patrol_radius: f32,
    /// Patrol: пауза на точке (секунды)
    pub patrol_wait: f32,
    /// Pursuit: сдаёмся через N секунд
    pub pursuit_timeout: f32,
    /// Investigate: сдаёмся через N секунд
    pub investigate_timeout: f32,
    /// Vigilance после боя (0 = сразу в default)
    pub vigilance_duration: f32,
    /// Период чистки TargetSensor (секунды)
    pub sensor_prune_interval: f32,
    /// Радиус "пришли" для точек назначения (метры)
    pub arrival_radius: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            patrol_radius: 8.0,
            patrol_wait: 2.0,
            pursuit_timeout: 6.0,
            investigate_timeout: 8.0,
            vigilance_duration: 4.0,
            sensor_prune_interval: 0.5,
            arrival_radius: 0.75,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("patrol_radius", self.patrol_radius)?;
        positive("pursuit_timeout", self.pursuit_timeout)?;
        positive("investigate_timeout", self.investigate_timeout)?;
        positive("sensor_prune_interval", self.sensor_prune_interval)?;
        positive("arrival_radius", self.arrival_radius)?;

        non_negative("patrol_wait", self.patrol_wait)?;
        non_negative("vigilance_duration", self.vigilance_duration)?;
        Ok(())
    }
}

/// Какие capability агента работают
///
/// Missing dependency (нет сенсора, navigation agent, combat strategy)
/// выключает ровно одну capability — остальная симуляция продолжает работать.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentCapabilities {
    pub sensing: bool,
    pub movement: bool,
    pub combat: bool,
    /// validate_agent_dependencies уже отработал
    pub initialized: bool,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            sensing: true,
            movement: true,
            combat: true,
            initialized: false,
        }
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
