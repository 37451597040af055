//! Agent FSM system (Enter / Update / Exit).
//!
//! Один проход на тик:
//! 1. pending order от сквада (apply_squad_orders)
//! 2. pending damage (record_damage_events)
//! 3. Update текущего state → опциональный переход
//!
//! Exit любого state синхронно останавливает движение и освобождает
//! резервацию: устаревший приказ не переживает смену state.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::ai::events::WeaponFireIntent;
use crate::ai::{
    Agent, AgentCapabilities, AgentConfig, AgentOrder, AgentState, CombatContext, CombatDirective,
    CombatMovement, CombatStrategy, DefaultBehavior, PatrolRoute, PendingDamage,
};
use crate::components::{horizontal_distance, Actor, LookAt, MovementCommand, SensorOffsets};
use crate::config::TacticalConfig;
use crate::perception::{
    best_target, CurrentTarget, LineOfSightCache, Observer, SimulationFrame, TargetRegistry,
    TargetSensor, TargetSnapshot, Visibility,
};
use crate::spatial::{SpatialOracle, SpatialQuery, COLLISION_MASK_RAYCAST_LOS};
use crate::squad::{SquadMember, SquadReport};
use crate::tactics::{PositionReservations, SearchRequest};
use crate::DeterministicRng;

/// Агент стоит ровно на посту (navigator доводит до точки)
const POST_TOLERANCE: f32 = 0.1;

/// Обёртка над movement/look компонентами агента
///
/// Пишет только если значение реально изменилось (иначе
/// Changed<MovementCommand> срабатывает каждый tick и путь пересчитывается).
pub(crate) struct Motor<'a> {
    pub command: Mut<'a, MovementCommand>,
    pub look: Mut<'a, LookAt>,
    /// capability movement (без NavigationAgent агент не ходит)
    pub enabled: bool,
}

impl Motor<'_> {
    pub fn move_to(&mut self, point: Vec3) {
        if self.enabled {
            self.command
                .set_if_neq(MovementCommand::MoveToPosition { target: point });
        }
    }

    pub fn follow(&mut self, target: Entity) {
        if self.enabled {
            self.command.set_if_neq(MovementCommand::FollowEntity { target });
        }
    }

    pub fn stop(&mut self) {
        if self.command.is_moving() {
            self.command.set_if_neq(MovementCommand::Stop);
        }
    }

    pub fn look_at(&mut self, point: Option<Vec3>) {
        self.look.set_if_neq(LookAt { point });
    }

    /// Полная остановка: движение + взгляд
    pub fn halt(&mut self) {
        self.stop();
        self.look_at(None);
    }
}

/// Общие ресурсы тика (одни на всех агентов)
struct TickContext<'a> {
    registry: &'a TargetRegistry,
    spatial: &'a dyn SpatialQuery,
    visibility: Visibility<'a>,
    tactical: &'a TacticalConfig,
    reservations: &'a mut PositionReservations,
    rng: &'a mut ChaCha8Rng,
    reports: Vec<SquadReport>,
    fire: Vec<WeaponFireIntent>,
    delta: f32,
}

/// Один агент на время тика
struct Unit<'a> {
    entity: Entity,
    faction: u64,
    position: Vec3,
    eye: Vec3,
    weapon: Vec3,
    offsets: SensorOffsets,
    config: &'a AgentConfig,
    caps: AgentCapabilities,
    squad: Option<Entity>,
    route: Option<&'a PatrolRoute>,
    sensor: Option<&'a TargetSensor>,
    agent: Mut<'a, Agent>,
    state: Mut<'a, AgentState>,
    current: Mut<'a, CurrentTarget>,
    cache: Mut<'a, LineOfSightCache>,
    motor: Motor<'a>,
    strategy: Option<Mut<'a, CombatStrategy>>,
}

/// Система: Agent FSM update (после apply_squad_orders, до execute_movement)
pub fn agent_fsm_update(
    mut agents: Query<(
        Entity,
        &Actor,
        &Transform,
        &SensorOffsets,
        &AgentConfig,
        &AgentCapabilities,
        &mut Agent,
        &mut AgentState,
        &mut CurrentTarget,
        &mut LineOfSightCache,
        (&mut MovementCommand, &mut LookAt),
        Option<&TargetSensor>,
        Option<&mut CombatStrategy>,
        Option<&PatrolRoute>,
        Option<&SquadMember>,
    )>,
    registry: Res<TargetRegistry>,
    spatial: Option<Res<SpatialOracle>>,
    frame: Res<SimulationFrame>,
    tactical: Res<TacticalConfig>,
    mut reservations: ResMut<PositionReservations>,
    mut rng: ResMut<DeterministicRng>,
    mut reports: EventWriter<SquadReport>,
    mut fire_events: EventWriter<WeaponFireIntent>,
    time: Res<Time<Fixed>>,
) {
    let Some(spatial) = spatial else {
        return;
    };

    let mut tick = TickContext {
        registry: &registry,
        spatial: spatial.query(),
        visibility: Visibility {
            spatial: spatial.query(),
            frame: frame.index,
            invalidation_distance: tactical.los_invalidation_distance,
        },
        tactical: &tactical,
        reservations: &mut *reservations,
        rng: &mut rng.rng,
        reports: Vec::new(),
        fire: Vec::new(),
        delta: time.delta_secs(),
    };

    for (
        entity,
        actor,
        transform,
        offsets,
        config,
        caps,
        agent,
        state,
        current,
        cache,
        (command, look),
        sensor,
        strategy,
        route,
        member,
    ) in agents.iter_mut()
    {
        if state.is_dead() || !caps.initialized {
            continue;
        }

        let mut unit = Unit {
            entity,
            faction: actor.faction_id,
            position: transform.translation,
            eye: offsets.eye_point(transform),
            weapon: offsets.weapon_point(transform),
            offsets: *offsets,
            config,
            caps: *caps,
            squad: member.map(|m| m.squad),
            route,
            sensor,
            agent,
            state,
            current,
            cache,
            motor: Motor {
                command,
                look,
                enabled: caps.movement,
            },
            strategy,
        };

        unit.tick(&mut tick);
    }

    for report in tick.reports {
        reports.write(report);
    }
    for intent in tick.fire {
        fire_events.write(intent);
    }
}

impl Unit<'_> {
    fn tick(&mut self, tick: &mut TickContext) {
        self.cache.retain_frame(tick.visibility.frame);

        if let Some(order) = self.agent.pending_order {
            self.agent.pending_order = None;
            self.apply_order(order, tick);
        }

        if let Some(damage) = self.agent.pending_damage {
            self.agent.pending_damage = None;
            self.apply_damage(damage, tick);
        }

        let next = match self.state.clone() {
            AgentState::Patrol {
                wait_timer,
                destination,
            } => self.update_patrol(wait_timer, destination, tick),
            AgentState::PathFollowing { index, forward } => {
                self.update_path_following(index, forward, tick)
            }
            AgentState::Attack { target } => self.update_attack(target, tick),
            AgentState::Pursuit {
                target,
                last_known,
                timer,
            } => self.update_pursuit(target, last_known, timer, tick),
            AgentState::Investigate { point, timer } => self.update_investigate(point, timer, tick),
            AgentState::Vigilance { timer } => self.update_vigilance(timer, tick),
            AgentState::Regroup { point } => self.update_regroup(point, tick),
            AgentState::Dead => None,
        };

        if let Some(next) = next {
            self.transition(next, tick);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn transition(&mut self, next: AgentState, tick: &mut TickContext) {
        crate::logger::log(&format!(
            "AI: {:?} {} → {}",
            self.entity,
            self.state.name(),
            next.name()
        ));

        self.exit(tick);
        *self.state = next;
        self.enter();
    }

    fn enter(&mut self) {
        if matches!(*self.state, AgentState::Attack { .. }) {
            if let Some(strategy) = self.strategy.as_mut() {
                strategy.0.enter_combat();
            }
        }
    }

    fn exit(&mut self, tick: &mut TickContext) {
        if matches!(*self.state, AgentState::Attack { .. }) {
            if let Some(strategy) = self.strategy.as_mut() {
                strategy.0.exit_combat();
            }
        }

        self.motor.halt();
        tick.reservations.release(self.entity);
        self.agent.assigned_position = None;
        self.agent.position_reported = false;
        self.agent.reposition_requested = false;
    }

    /// Default state (Patrol / PathFollowing / держать позицию) — выбран при инициализации
    fn default_state(&self) -> AgentState {
        match self.agent.default_behavior {
            DefaultBehavior::Patrol => AgentState::Patrol {
                wait_timer: self.config.patrol_wait,
                destination: None,
            },
            DefaultBehavior::PathFollowing => {
                let (index, forward) = self.agent.route_progress;
                AgentState::PathFollowing { index, forward }
            }
            DefaultBehavior::SquadControlled => AgentState::Regroup {
                point: self.position,
            },
        }
    }

    /// После боя: Vigilance (если включена) или сразу default
    fn after_combat_state(&self) -> AgentState {
        if self.config.vigilance_duration > 0.0 {
            AgentState::Vigilance {
                timer: self.config.vigilance_duration,
            }
        } else {
            self.default_state()
        }
    }

    fn arrived(&self, point: Vec3) -> bool {
        horizontal_distance(self.position, point) <= self.config.arrival_radius
    }

    fn report(&self, tick: &mut TickContext, build: impl FnOnce(Entity) -> SquadReport) {
        if let Some(squad) = self.squad {
            tick.reports.push(build(squad));
        }
    }

    // ------------------------------------------------------------------
    // External inputs
    // ------------------------------------------------------------------

    fn apply_order(&mut self, order: AgentOrder, tick: &mut TickContext) {
        match order {
            AgentOrder::Engage { target, position } => {
                if !self.caps.combat || !self.current.force_set(target, self.faction, tick.registry) {
                    crate::logger::log_warning(&format!(
                        "AI: {:?} invalid engage order on {:?} → disengage",
                        self.entity, target
                    ));
                    self.disengage(tick);
                    return;
                }

                if !matches!(*self.state, AgentState::Attack { target: t } if t == target) {
                    self.transition(AgentState::Attack { target }, tick);
                }

                self.agent.assigned_position = position;
                self.agent.position_reported = false;
                self.agent.reposition_requested = false;
                if let Some(point) = position {
                    tick.reservations.reserve(self.entity, point);
                }
            }
            AgentOrder::MoveTo { point } => {
                self.current.clear();
                if matches!(*self.state, AgentState::Regroup { point: p } if p == point) {
                    // Тот же приказ повторно → отчитаться ещё раз
                    self.agent.position_reported = false;
                } else {
                    self.transition(AgentState::Regroup { point }, tick);
                }
            }
            AgentOrder::Disengage => self.disengage(tick),
        }
    }

    fn disengage(&mut self, tick: &mut TickContext) {
        self.current.clear();
        if self.state.is_engaged() {
            let next = self.after_combat_state();
            self.transition(next, tick);
        }
    }

    /// Урон: в Attack держим цель (атакующий уже в сенсоре), иначе Investigate
    fn apply_damage(&mut self, damage: PendingDamage, tick: &mut TickContext) {
        match self.state.clone() {
            AgentState::Dead => {}
            AgentState::Attack { target } => {
                crate::logger::log(&format!(
                    "AI: {:?} damaged by {:?} while attacking {:?} → keeps target",
                    self.entity, damage.source, target
                ));
            }
            AgentState::Pursuit { target, timer, .. } if damage.source == Some(target) => {
                self.state.set_if_neq(AgentState::Pursuit {
                    target,
                    last_known: damage.point,
                    timer,
                });
            }
            AgentState::Investigate { .. } => {
                self.state.set_if_neq(AgentState::Investigate {
                    point: damage.point,
                    timer: self.config.investigate_timeout,
                });
            }
            _ => self.transition(
                AgentState::Investigate {
                    point: damage.point,
                    timer: self.config.investigate_timeout,
                },
                tick,
            ),
        }
    }

    /// Выбор цели самим агентом (только вне сквада: в скваде цели выбирает сквад)
    fn try_acquire(&mut self, tick: &mut TickContext) -> Option<AgentState> {
        if self.squad.is_some() || !self.caps.sensing || !self.caps.combat {
            return None;
        }

        let sensor = self.sensor?;
        if sensor.is_empty() {
            return None;
        }

        let observer = Observer {
            entity: self.entity,
            faction_id: self.faction,
            eye: self.eye,
        };
        let best = best_target(
            &observer,
            &sensor.detected,
            tick.registry,
            &tick.visibility,
            &mut self.cache,
            tick.tactical,
        )?;

        if !self.current.force_set(best.target, self.faction, tick.registry) {
            return None;
        }

        crate::logger::log(&format!(
            "⚔️ {:?} acquired target {:?} (score {:.3})",
            self.entity, best.target, best.score
        ));
        Some(AgentState::Attack {
            target: best.target,
        })
    }

    // ------------------------------------------------------------------
    // State updates
    // ------------------------------------------------------------------

    fn update_patrol(
        &mut self,
        wait_timer: f32,
        destination: Option<Vec3>,
        tick: &mut TickContext,
    ) -> Option<AgentState> {
        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        match destination {
            Some(point) if self.arrived(point) => {
                self.motor.stop();
                self.state.set_if_neq(AgentState::Patrol {
                    wait_timer: self.config.patrol_wait,
                    destination: None,
                });
            }
            Some(point) => self.motor.move_to(point),
            None => {
                let remaining = wait_timer - tick.delta;
                if remaining > 0.0 || !self.caps.movement {
                    self.state.set_if_neq(AgentState::Patrol {
                        wait_timer: remaining.max(0.0),
                        destination: None,
                    });
                } else {
                    let point = self.random_patrol_point(tick);
                    self.motor.move_to(point);
                    self.state.set_if_neq(AgentState::Patrol {
                        wait_timer: 0.0,
                        destination: Some(point),
                    });
                }
            }
        }

        None
    }

    fn random_patrol_point(&self, tick: &mut TickContext) -> Vec3 {
        let angle = tick.rng.gen::<f32>() * std::f32::consts::TAU;
        let distance = self.config.patrol_radius * tick.rng.gen_range(0.25_f32..=1.0);
        let raw = self.agent.home + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
        tick.spatial.nearest_walkable_point(raw)
    }

    fn update_path_following(
        &mut self,
        index: usize,
        forward: bool,
        tick: &mut TickContext,
    ) -> Option<AgentState> {
        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        let Some(route) = self.route else {
            self.motor.stop();
            return None;
        };
        let Some(&waypoint) = route.waypoints.get(index) else {
            self.motor.stop();
            return None;
        };

        if !self.arrived(waypoint) {
            self.motor.move_to(waypoint);
            return None;
        }

        match route.advance(index, forward) {
            Some((next_index, next_forward)) => {
                self.agent.route_progress = (next_index, next_forward);
                self.state.set_if_neq(AgentState::PathFollowing {
                    index: next_index,
                    forward: next_forward,
                });
                if let Some(&next_point) = route.waypoints.get(next_index) {
                    self.motor.move_to(next_point);
                }
            }
            // Assault маршрут закончен — стоим на последней точке
            None => self.motor.stop(),
        }

        None
    }

    fn update_attack(&mut self, target: Entity, tick: &mut TickContext) -> Option<AgentState> {
        let Some(snapshot) = tick.registry.live(target).cloned() else {
            return Some(self.on_target_eliminated(target, tick));
        };

        let Some(aim_point) = self.cache.first_visible_point(
            &tick.visibility,
            self.eye,
            &snapshot,
            &[self.entity],
        ) else {
            // Ещё идём на назначенную позицию: обзор проверялся с самой точки
            if let Some(point) = self.agent.assigned_position {
                let on_post = horizontal_distance(self.position, point) <= POST_TOLERANCE;
                if self.caps.movement && (!self.agent.position_reported || !on_post) {
                    self.motor.move_to(point);
                    self.motor.look_at(Some(snapshot.center));
                    self.check_assigned_arrival(tick);
                    return None;
                }
            }

            crate::logger::log(&format!(
                "AI: {:?} lost sight of {:?} → pursuit",
                self.entity, target
            ));
            return Some(AgentState::Pursuit {
                target,
                last_known: snapshot.position,
                timer: self.config.pursuit_timeout,
            });
        };

        self.motor.look_at(Some(aim_point));

        let faction = self.faction;
        let registry = tick.registry;
        let line_of_fire = tick
            .spatial
            .raycast(self.weapon, aim_point, &[self.entity], COLLISION_MASK_RAYCAST_LOS)
            .map(|hit| {
                hit.classify(target, |body| {
                    registry.get(body).is_some_and(|s| s.faction_id == faction)
                })
            });

        let context = CombatContext {
            agent: self.entity,
            position: self.position,
            target,
            target_position: snapshot.position,
            aim_point,
            distance: horizontal_distance(self.position, snapshot.position),
            assigned_position: self.agent.assigned_position,
            arrival_radius: self.config.arrival_radius,
            line_of_fire,
        };

        let directive = match self.strategy.as_mut() {
            Some(strategy) => strategy.0.process(&context, tick.delta),
            None => CombatDirective::hold(),
        };

        match directive.movement {
            CombatMovement::Hold => self.motor.stop(),
            CombatMovement::MoveTo(point) => self.motor.move_to(point),
            CombatMovement::Chase => self.motor.follow(target),
        }

        if directive.fire {
            tick.fire.push(WeaponFireIntent {
                shooter: self.entity,
                target,
                aim_point,
            });
        }

        self.check_assigned_arrival(tick);

        if directive.request_reposition {
            self.request_reposition(&snapshot, tick);
        }

        None
    }

    /// Назначенная позиция достигнута → release резервации + отчёт скваду
    fn check_assigned_arrival(&mut self, tick: &mut TickContext) {
        let Some(point) = self.agent.assigned_position else {
            return;
        };
        if self.agent.position_reported || !self.arrived(point) {
            return;
        }

        self.agent.position_reported = true;
        tick.reservations.release(self.entity);
        let agent = self.entity;
        self.report(tick, |squad| SquadReport::PositionReached { squad, agent, point });
    }

    /// Линия огня закрыта: в скваде просим сквад, в одиночку ищем сами
    fn request_reposition(&mut self, target: &TargetSnapshot, tick: &mut TickContext) {
        if self.agent.reposition_requested {
            return;
        }
        self.agent.reposition_requested = true;

        if self.squad.is_some() {
            let agent = self.entity;
            self.report(tick, |squad| SquadReport::RepositionRequested { squad, agent });
            return;
        }

        let request = SearchRequest {
            agent: self.entity,
            position: self.position,
            offsets: self.offsets,
            target,
            radius: tick.tactical.search_radius,
            step: tick.tactical.search_step,
            ignore: &[],
        };

        let found = tick
            .tactical
            .search_strategy
            .find(tick.spatial, &request, Some(&*tick.reservations));
        if let Some(found) = found {
            tick.reservations.reserve(self.entity, found.point);
            self.agent.assigned_position = Some(found.point);
            self.agent.position_reported = false;
            self.agent.reposition_requested = false;
        }
    }

    fn on_target_eliminated(&mut self, target: Entity, tick: &mut TickContext) -> AgentState {
        crate::logger::log(&format!(
            "💀 {:?} target {:?} eliminated",
            self.entity, target
        ));
        let agent = self.entity;
        self.report(tick, |squad| SquadReport::TargetEliminated {
            squad,
            agent,
            target,
        });
        self.current.clear();
        self.after_combat_state()
    }

    fn update_pursuit(
        &mut self,
        target: Entity,
        last_known: Vec3,
        timer: f32,
        tick: &mut TickContext,
    ) -> Option<AgentState> {
        let Some(snapshot) = tick.registry.live(target).cloned() else {
            return Some(self.on_target_eliminated(target, tick));
        };

        if self
            .cache
            .first_visible_point(&tick.visibility, self.eye, &snapshot, &[self.entity])
            .is_some()
        {
            return Some(AgentState::Attack { target });
        }

        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        let remaining = timer - tick.delta;
        if remaining <= 0.0 || self.arrived(last_known) {
            crate::logger::log(&format!(
                "AI: {:?} pursuit of {:?} gave up",
                self.entity, target
            ));
            self.current.clear();
            return Some(self.after_combat_state());
        }

        self.motor.move_to(last_known);
        self.state.set_if_neq(AgentState::Pursuit {
            target,
            last_known,
            timer: remaining,
        });
        None
    }

    fn update_investigate(
        &mut self,
        point: Vec3,
        timer: f32,
        tick: &mut TickContext,
    ) -> Option<AgentState> {
        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        let remaining = timer - tick.delta;
        if remaining <= 0.0 || self.arrived(point) {
            return Some(self.after_combat_state());
        }

        self.motor.move_to(point);
        self.state.set_if_neq(AgentState::Investigate {
            point,
            timer: remaining,
        });
        None
    }

    fn update_vigilance(&mut self, timer: f32, tick: &mut TickContext) -> Option<AgentState> {
        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        self.motor.stop();
        let remaining = timer - tick.delta;
        if remaining <= 0.0 {
            return Some(self.default_state());
        }

        self.state
            .set_if_neq(AgentState::Vigilance { timer: remaining });
        None
    }

    fn update_regroup(&mut self, point: Vec3, tick: &mut TickContext) -> Option<AgentState> {
        if let Some(next) = self.try_acquire(tick) {
            return Some(next);
        }

        if !self.arrived(point) {
            self.motor.move_to(point);
            return None;
        }

        self.motor.stop();
        if !self.agent.position_reported {
            self.agent.position_reported = true;
            let agent = self.entity;
            self.report(tick, |squad| SquadReport::PositionReached { squad, agent, point });
        }
        None
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
