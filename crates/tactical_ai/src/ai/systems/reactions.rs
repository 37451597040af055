//! AI reaction systems (init, damage, death, squad orders).

use bevy::prelude::*;

use crate::ai::events::DamageTaken;
use crate::ai::{
    Agent, AgentCapabilities, AgentConfig, AgentState, CombatStrategy, DefaultBehavior,
    PatrolRoute, PendingDamage,
};
use crate::components::{Actor, Health, LookAt, MovementCommand, NavigationAgent};
use crate::perception::{CurrentTarget, TargetRegistry, TargetSensor};
use crate::squad::{SquadMember, SquadOrder};
use crate::tactics::PositionReservations;

/// System: первичная инициализация агента (один раз)
///
/// Проверяет коллабораторов. Отсутствующий выключает одну capability
/// и логируется как ошибка, остальная симуляция продолжает работать.
pub fn validate_agent_dependencies(
    mut agents: Query<(
        Entity,
        &Transform,
        &mut AgentConfig,
        &mut Agent,
        &mut AgentCapabilities,
        &mut AgentState,
        Option<&mut TargetSensor>,
        Option<&NavigationAgent>,
        Option<&CombatStrategy>,
        Option<&PatrolRoute>,
        Option<&SquadMember>,
    )>,
) {
    for (
        entity,
        transform,
        mut config,
        mut agent,
        mut caps,
        mut state,
        sensor,
        navigation,
        strategy,
        route,
        member,
    ) in agents.iter_mut()
    {
        if caps.initialized {
            continue;
        }

        agent.home = transform.translation;

        if let Err(err) = config.validate() {
            crate::logger::log_error(&format!(
                "AI: {:?} invalid AgentConfig ({}) → defaults",
                entity, err
            ));
            *config = AgentConfig::default();
        }

        caps.sensing = sensor.is_some();
        caps.movement = navigation.is_some();
        caps.combat = strategy.is_some();
        caps.initialized = true;

        if let Some(mut sensor) = sensor {
            sensor.prune_interval = config.sensor_prune_interval;
        } else {
            crate::logger::log_error(&format!(
                "AI: {:?} has no TargetSensor → sensing disabled",
                entity
            ));
        }
        if navigation.is_none() {
            crate::logger::log_error(&format!(
                "AI: {:?} has no NavigationAgent → movement disabled",
                entity
            ));
        }
        if strategy.is_none() {
            crate::logger::log_error(&format!(
                "AI: {:?} has no CombatStrategy → combat disabled",
                entity
            ));
        }

        agent.default_behavior = if member.is_some() {
            DefaultBehavior::SquadControlled
        } else if route.is_some_and(|r| !r.waypoints.is_empty()) {
            DefaultBehavior::PathFollowing
        } else {
            DefaultBehavior::Patrol
        };

        *state = match agent.default_behavior {
            DefaultBehavior::Patrol => AgentState::Patrol {
                wait_timer: config.patrol_wait,
                destination: None,
            },
            DefaultBehavior::PathFollowing => {
                let (index, forward) = agent.route_progress;
                AgentState::PathFollowing { index, forward }
            }
            DefaultBehavior::SquadControlled => AgentState::Regroup {
                point: transform.translation,
            },
        };

        crate::logger::log(&format!(
            "🤖 AI: {:?} initialized ({:?}, sensing={}, movement={}, combat={})",
            entity, agent.default_behavior, caps.sensing, caps.movement, caps.combat
        ));
    }
}

/// System: DamageTaken → pending damage для FSM
///
/// Урон от своих игнорируется. Враг-источник добавляется в сенсор
/// (агент "почувствовал" стрелка даже если тот вне trigger volume).
pub fn record_damage_events(
    mut damage_events: EventReader<DamageTaken>,
    mut agents: Query<(&Actor, &Transform, &mut Agent, Option<&mut TargetSensor>)>,
    registry: Res<TargetRegistry>,
) {
    for event in damage_events.read() {
        let Ok((actor, transform, mut agent, sensor)) = agents.get_mut(event.agent) else {
            continue;
        };

        let source = event.source.and_then(|s| registry.get(s));
        if source.is_some_and(|s| s.faction_id == actor.faction_id) {
            continue;
        }

        if let (Some(source), Some(mut sensor)) = (source, sensor) {
            if source.is_alive() && sensor.detect(source.entity) {
                crate::logger::log(&format!(
                    "⚠️ {:?} damaged by {:?} → added to sensor",
                    event.agent, source.entity
                ));
            }
        }

        let point = event
            .source_position
            .or(source.map(|s| s.position))
            .unwrap_or(transform.translation);

        agent.pending_damage = Some(PendingDamage {
            source: event.source,
            point,
        });
    }
}

/// System: HP == 0 → Dead (терминальный state)
///
/// Мёртвый агент останавливается, отпускает резервацию и забывает цели.
pub fn handle_agent_death(
    mut agents: Query<
        (
            Entity,
            &Health,
            &mut AgentState,
            &mut CurrentTarget,
            &mut MovementCommand,
            &mut LookAt,
            Option<&mut TargetSensor>,
            Option<&mut CombatStrategy>,
        ),
        (With<Agent>, Changed<Health>),
    >,
    mut reservations: ResMut<PositionReservations>,
) {
    for (entity, health, mut state, mut current, mut command, mut look, sensor, strategy) in
        agents.iter_mut()
    {
        if health.is_alive() || state.is_dead() {
            continue;
        }

        if matches!(*state, AgentState::Attack { .. }) {
            if let Some(mut strategy) = strategy {
                strategy.0.exit_combat();
            }
        }

        command.set_if_neq(MovementCommand::Stop);
        look.set_if_neq(LookAt { point: None });
        reservations.release(entity);
        current.clear();
        if let Some(mut sensor) = sensor {
            sensor.clear();
        }

        *state = AgentState::Dead;
        crate::logger::log(&format!("💀 {:?} died → AI disabled (Dead state)", entity));
    }
}

/// System: SquadOrder → pending order агента
pub fn apply_squad_orders(mut orders: EventReader<SquadOrder>, mut agents: Query<&mut Agent>) {
    for order in orders.read() {
        if let Ok(mut agent) = agents.get_mut(order.agent) {
            agent.pending_order = Some(order.order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn test_missing_dependencies_disable_capabilities() {
        let mut world = World::new();
        let bare = world
            .spawn((Agent::new(), Transform::from_xyz(1.0, 0.0, 2.0)))
            .id();
        let full = world
            .spawn((
                Agent::new(),
                Transform::default(),
                TargetSensor::default(),
                NavigationAgent::default(),
                CombatStrategy::new(crate::ai::RangedSkirmisher::default()),
            ))
            .id();

        world.run_system_once(validate_agent_dependencies).unwrap();

        let caps = world.get::<AgentCapabilities>(bare).unwrap();
        assert!(caps.initialized);
        assert!(!caps.sensing && !caps.movement && !caps.combat);
        assert_eq!(world.get::<Agent>(bare).unwrap().home, Vec3::new(1.0, 0.0, 2.0));

        let caps = world.get::<AgentCapabilities>(full).unwrap();
        assert!(caps.sensing && caps.movement && caps.combat);
    }

    #[test]
    fn test_default_behavior_selection() {
        let mut world = World::new();
        let squad = world.spawn_empty().id();
        let patrol = world.spawn((Agent::new(), Transform::default())).id();
        let path = world
            .spawn((
                Agent::new(),
                Transform::default(),
                PatrolRoute::new(vec![Vec3::X, Vec3::Z], crate::ai::PathMode::PingPong),
            ))
            .id();
        let member = world
            .spawn((Agent::new(), Transform::default(), SquadMember { squad }))
            .id();

        world.run_system_once(validate_agent_dependencies).unwrap();

        assert_eq!(world.get::<Agent>(patrol).unwrap().default_behavior, DefaultBehavior::Patrol);
        assert_eq!(
            world.get::<Agent>(path).unwrap().default_behavior,
            DefaultBehavior::PathFollowing
        );
        assert!(matches!(
            world.get::<AgentState>(path).unwrap(),
            AgentState::PathFollowing { index: 0, forward: true }
        ));
        assert_eq!(
            world.get::<Agent>(member).unwrap().default_behavior,
            DefaultBehavior::SquadControlled
        );
    }

    #[test]
    fn test_death_releases_reservation() {
        let mut world = World::new();
        world.insert_resource(PositionReservations::default());
        let agent = world
            .spawn((
                Agent::new(),
                Health::new(50),
                AgentState::Attack { target: Entity::from_raw(99) },
                MovementCommand::MoveToPosition { target: Vec3::X },
            ))
            .id();
        world
            .resource_mut::<PositionReservations>()
            .reserve(agent, Vec3::X);

        world.get_mut::<Health>(agent).unwrap().take_damage(50);
        world.run_system_once(handle_agent_death).unwrap();

        assert_eq!(*world.get::<AgentState>(agent).unwrap(), AgentState::Dead);
        assert_eq!(*world.get::<MovementCommand>(agent).unwrap(), MovementCommand::Stop);
        assert!(!world.resource::<PositionReservations>().has_reservation(agent));
    }
}
