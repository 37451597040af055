//! Squad events: отчёты агентов наверх, приказы сквада вниз

use bevy::prelude::*;

use crate::ai::AgentOrder;

/// Отчёт участника скваду (reportPositionReached / reportTargetEliminated / reposition)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum SquadReport {
    /// point — та позиция, к которой шёл агент (старые отчёты не совпадут)
    PositionReached {
        squad: Entity,
        agent: Entity,
        point: Vec3,
    },
    TargetEliminated {
        squad: Entity,
        agent: Entity,
        target: Entity,
    },
    /// Линия огня с назначенной позиции закрыта
    RepositionRequested {
        squad: Entity,
        agent: Entity,
    },
}

impl SquadReport {
    pub fn squad(&self) -> Entity {
        match *self {
            Self::PositionReached { squad, .. }
            | Self::TargetEliminated { squad, .. }
            | Self::RepositionRequested { squad, .. } => squad,
        }
    }
}

/// Приказ сквада конкретному агенту
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct SquadOrder {
    pub agent: Entity,
    pub order: AgentOrder,
}
