//! Squad components: Squad, SquadState, SquadMember.

use bevy::prelude::*;

use crate::ai::{PathMode, PatrolRoute};
use crate::config::TacticalConfig;
use crate::error::OrderError;
use crate::perception::TargetRegistry;
use crate::tactics::Formation;

/// Миссия сквада
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum MissionMode {
    /// Стоим на месте, ждём приказов
    #[default]
    Standby,
    /// Патруль по пути туда-обратно
    FollowPath,
    /// Штурм: идём по пути и останавливаемся в конце
    AssaultPath,
}

/// Squad FSM состояния
#[derive(Component, Debug, Clone, PartialEq, Default)]
pub enum SquadState {
    #[default]
    Idle,
    MovingToPoint { point: Vec3 },
    FollowingPath { index: usize, forward: bool },
    Combat { target: Entity },
    Pursuit {
        target: Entity,
        last_known: Vec3,
        timer: f32,
    },
    /// Терминальное: участников не осталось, приказы не принимаются
    Disbanded,
}

impl SquadState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::MovingToPoint { .. } => "MovingToPoint",
            Self::FollowingPath { .. } => "FollowingPath",
            Self::Combat { .. } => "Combat",
            Self::Pursuit { .. } => "Pursuit",
            Self::Disbanded => "Disbanded",
        }
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Combat { .. } | Self::Pursuit { .. })
    }
}

/// Как сквад распределил позиции под текущую цель (fallback chain)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatPlan {
    Cover,
    Formation,
    FiringArc,
    DirectAssault,
}

/// Внешний приказ, ожидающий своего тика
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SquadCommand {
    MoveTo(Vec3),
    Attack(Entity),
}

/// Сквад: владеет списком участников (агент хранит только слабую ссылку SquadMember)
#[derive(Component, Debug, Clone)]
#[require(SquadState)]
pub struct Squad {
    pub faction_id: u64,
    /// Порядок вставки значим (детерминированная итерация)
    members: Vec<Entity>,
    pub mission: MissionMode,
    /// Общая цель сквада (None когда она никому не нужна)
    pub target: Option<Entity>,
    pub last_known_target_position: Option<Vec3>,
    /// Путь миссии (неизменяем после загрузки)
    path: Vec<Vec3>,
    /// None → шеренга с шагом из TacticalConfig::formation_spacing
    pub formation: Option<Formation>,
    /// Последний план боя (для логов и тестов)
    pub plan: Option<CombatPlan>,
    /// (участник, точка), от которых ждём PositionReached
    pub(crate) awaiting: Vec<(Entity, Vec3)>,
    pub(crate) pending_command: Option<SquadCommand>,
    /// Прогресс по пути миссии (переживает бой)
    pub(crate) route_progress: (usize, bool),
    disbanded: bool,
}

impl Squad {
    pub fn new(faction_id: u64, mission: MissionMode) -> Self {
        Self {
            faction_id,
            members: Vec::new(),
            mission,
            target: None,
            last_known_target_position: None,
            path: Vec::new(),
            formation: None,
            plan: None,
            awaiting: Vec::new(),
            pending_command: None,
            route_progress: (0, true),
            disbanded: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<Vec<Vec3>>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_formation(mut self, formation: Formation) -> Self {
        self.formation = Some(formation);
        self
    }

    /// Формация сквада (своя или по умолчанию из tuning)
    pub fn formation(&self, config: &TacticalConfig) -> Formation {
        self.formation.unwrap_or_else(|| config.default_formation())
    }

    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    pub fn path(&self) -> &[Vec3] {
        &self.path
    }

    /// Маршрут миссии (None для Standby или пустого пути)
    pub fn route(&self) -> Option<PatrolRoute> {
        let mode = match self.mission {
            MissionMode::Standby => return None,
            MissionMode::FollowPath => PathMode::PingPong,
            MissionMode::AssaultPath => PathMode::StopAtEnd,
        };
        if self.path.is_empty() {
            return None;
        }
        Some(PatrolRoute::new(self.path.clone(), mode))
    }

    pub fn add_member(&mut self, agent: Entity) {
        if !self.members.contains(&agent) {
            self.members.push(agent);
        }
    }

    /// true если участник был в скваде
    pub fn remove_member(&mut self, agent: Entity) -> bool {
        let before = self.members.len();
        self.members.retain(|&e| e != agent);
        self.awaiting.retain(|&(e, _)| e != agent);
        before != self.members.len()
    }

    /// Ждём отчёта агента о точке (одна запись на агента)
    pub(crate) fn await_arrival(&mut self, agent: Entity, point: Vec3) {
        self.awaiting.retain(|&(e, _)| e != agent);
        self.awaiting.push((agent, point));
    }

    /// Отчёт засчитывается только за ту точку, которую ждём
    pub(crate) fn mark_arrived(&mut self, agent: Entity, point: Vec3) -> bool {
        let before = self.awaiting.len();
        self.awaiting
            .retain(|&(e, p)| e != agent || p.distance_squared(point) > 1e-6);
        before != self.awaiting.len()
    }

    pub fn is_disbanded(&self) -> bool {
        self.disbanded
    }

    pub(crate) fn disband(&mut self) {
        self.disbanded = true;
        self.members.clear();
        self.awaiting.clear();
        self.target = None;
        self.last_known_target_position = None;
        self.pending_command = None;
        self.plan = None;
    }

    fn accepts_orders(&self) -> Result<(), OrderError> {
        if self.disbanded {
            return Err(OrderError::SquadDisbanded);
        }
        if self.members.is_empty() {
            return Err(OrderError::NoMembers);
        }
        Ok(())
    }

    /// Приказ: выдвинуться к точке (применится на тике сквада)
    pub fn order_move(&mut self, point: Vec3) -> Result<(), OrderError> {
        self.accepts_orders()?;
        self.pending_command = Some(SquadCommand::MoveTo(point));
        Ok(())
    }

    /// Приказ: атаковать цель (должна быть живой и враждебной)
    pub fn order_attack(&mut self, target: Entity, registry: &TargetRegistry) -> Result<(), OrderError> {
        self.accepts_orders()?;
        if registry.live_hostile(target, self.faction_id).is_none() {
            return Err(OrderError::InvalidTarget(target));
        }
        self.pending_command = Some(SquadCommand::Attack(target));
        Ok(())
    }
}

/// Слабая ссылка агента на свой сквад
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquadMember {
    pub squad: Entity,
}
