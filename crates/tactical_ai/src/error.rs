//! Ошибки тактического ядра
//!
//! Штатные провалы (поиск позиции ничего не нашёл, цель умерла) — это `Option`,
//! не ошибки. Здесь только misuse со стороны вызывающего кода.

use bevy::prelude::Entity;
use thiserror::Error;

/// Отказ в приказе сквад-уровня
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("squad is disbanded, no further orders accepted")]
    SquadDisbanded,

    #[error("target {0:?} is not a live hostile entity")]
    InvalidTarget(Entity),

    #[error("squad has no members")]
    NoMembers,

    #[error("a squad member still holds an active position reservation")]
    ReservationConflict,
}

/// Ошибка загрузки/валидации designer tuning
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse tactical config: {0}")]
    Parse(String),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
