//! Tactics: где стоять
//!
//! - search: FindOptimalFiringPosition (probing / hybrid)
//! - arc: GenerateFiringArcPositions для сквада
//! - reservation: advisory claims на точки назначения
//! - allocation: greedy распределение агентов по позициям + формации
//!
//! Провал поиска — это `None`/короткий Vec, никогда не ошибка: у вызывающего
//! всегда есть fallback chain (cover → formation → firing arc → direct assault).

pub mod allocation;
pub mod arc;
pub mod reservation;
pub mod search;

pub use allocation::{formation_anchor, optimal_assignments, Assignment, Formation, FormationShape};
pub use arc::{generate_firing_arc_positions, ArcMember};
pub use reservation::PositionReservations;
pub use search::{
    find_by_probing, find_hybrid, probe_directions, surface_tangent, validate_candidate,
    weapon_point_at, SearchRequest, SearchStrategy, TacticalPosition,
};
