//! Tactical AI Core
//!
//! ECS-симуляция на Bevy 0.16: восприятие, выбор целей, поиск огневых
//! позиций, agent FSM и squad FSM поверх одного fixed-step tick.
//!
//! Внешний мир (физика, navmesh, урон) подключается через oracle traits
//! (`spatial::SpatialQuery`, `spatial::Navigator`) и события
//! (`SensorEvent`, `DamageTaken`, `WeaponFireIntent`).

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

// Публичные модули
pub mod ai;
pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod movement;
pub mod perception;
pub mod spatial;
pub mod squad;
pub mod tactics;

// Re-export базовых типов для удобства
pub use ai::{
    Agent, AgentCapabilities, AgentConfig, AgentOrder, AgentState, CombatBehavior,
    CombatStrategy, DamageTaken, MeleeRusher, PatrolRoute, PathMode, RangedSkirmisher,
    SensorEvent, WeaponFireIntent,
};
pub use components::*;
pub use config::TacticalConfig;
pub use error::{ConfigError, OrderError};
pub use logger::init_logger;
pub use perception::{CurrentTarget, SimulationFrame, TargetRegistry, TargetSensor};
pub use spatial::{ArenaWorld, NavigationOracle, Obstacle, SpatialOracle, StraightLineNavigator};
pub use squad::{attach_members, MissionMode, Squad, SquadMember, SquadOrder, SquadReport, SquadState};
pub use tactics::{Formation, FormationShape, PositionReservations};

/// Главный plugin: ресурсы, события и вся цепочка систем в FixedUpdate
///
/// Порядок выполнения (одна `.chain()` для детерминизма):
/// 1. advance_frame — новый frame index для LoS cache
/// 2. refresh_target_registry — снимок целей на этот tick
/// 3. validate_agent_dependencies — инициализация новых агентов
/// 4. handle_sensor_events → record_damage_events → prune_sensors
/// 5. handle_agent_death
/// 6. squad_fsm_update — отчёты участников → приказы
/// 7. apply_squad_orders → agent_fsm_update
/// 8. process_movement_commands → execute_movement
#[derive(Default)]
pub struct TacticalPlugin {
    pub config: TacticalConfig,
}

impl TacticalPlugin {
    pub fn new(config: TacticalConfig) -> Self {
        Self { config }
    }
}

impl Plugin for TacticalPlugin {
    fn build(&self, app: &mut App) {
        let config = match self.config.validate() {
            Ok(()) => self.config.clone(),
            Err(err) => {
                crate::logger::log_error(&format!("TacticalConfig invalid: {} → defaults", err));
                TacticalConfig::default()
            }
        };

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app.insert_resource(PositionReservations::new(config.reservation_separation))
            .insert_resource(config)
            .init_resource::<TargetRegistry>()
            .init_resource::<SimulationFrame>()
            .add_event::<SensorEvent>()
            .add_event::<DamageTaken>()
            .add_event::<WeaponFireIntent>()
            .add_event::<SquadReport>()
            .add_event::<SquadOrder>()
            .add_systems(
                FixedUpdate,
                (
                    perception::advance_frame,
                    perception::refresh_target_registry,
                    ai::validate_agent_dependencies,
                    perception::handle_sensor_events,
                    ai::record_damage_events,
                    perception::prune_sensors,
                    ai::handle_agent_death,
                    squad::squad_fsm_update,
                    ai::apply_squad_orders,
                    ai::agent_fsm_update,
                    movement::process_movement_commands,
                    movement::execute_movement,
                )
                    .chain(), // Последовательное выполнение для детерминизма
            );
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Один simulation tick: сдвинуть Time<Fixed> на `dt` и прогнать FixedUpdate
pub fn run_tactical_tick(app: &mut App, dt: Duration) {
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(dt);
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Сериализуем в байты через Debug (простейший способ)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
