//! Squad FSM system
//!
//! Сквад решает, КОГО и ОТКУДА атаковать; агенты — КАК (их собственный FSM).
//! Вниз идут SquadOrder, наверх — SquadReport (читаются на следующем тике).
//!
//! Состояние сквада меняет только этот system (собственный tick + отчёты).

use bevy::prelude::*;
use std::collections::HashMap;

use super::components::{Squad, SquadCommand, SquadMember, SquadState};
use super::events::{SquadOrder, SquadReport};
use super::planning::plan_engagement;
use crate::ai::{Agent, AgentCapabilities, AgentOrder, AgentState};
use crate::components::{horizontal_distance, SensorOffsets};
use crate::config::TacticalConfig;
use crate::error::OrderError;
use crate::perception::{
    best_target, LineOfSightCache, Observer, SimulationFrame, TargetRegistry, TargetSensor,
    TargetSnapshot, ThreatScore, Visibility,
};
use crate::spatial::{SpatialOracle, SpatialQuery};
use crate::tactics::{
    formation_anchor, optimal_assignments, ArcMember, PositionReservations,
    SearchRequest,
};

type MemberQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static Transform,
        &'static SensorOffsets,
        &'static AgentState,
        &'static AgentCapabilities,
        Option<&'static TargetSensor>,
        &'static mut LineOfSightCache,
    ),
    With<Agent>,
>;

/// Общие ресурсы тика
struct SquadTick<'a> {
    registry: &'a TargetRegistry,
    spatial: &'a dyn SpatialQuery,
    visibility: Visibility<'a>,
    config: &'a TacticalConfig,
    reservations: &'a mut PositionReservations,
    orders: Vec<SquadOrder>,
    delta: f32,
}

/// Система: Squad FSM update (до apply_squad_orders)
pub fn squad_fsm_update(
    mut commands: Commands,
    mut squads: Query<(Entity, &mut Squad, &mut SquadState)>,
    mut members: MemberQuery,
    registry: Res<TargetRegistry>,
    spatial: Option<Res<SpatialOracle>>,
    frame: Res<SimulationFrame>,
    config: Res<TacticalConfig>,
    mut reservations: ResMut<PositionReservations>,
    mut reports: EventReader<SquadReport>,
    mut order_events: EventWriter<SquadOrder>,
    time: Res<Time<Fixed>>,
) {
    let Some(spatial) = spatial else {
        return;
    };

    let mut inbox: HashMap<Entity, Vec<SquadReport>> = HashMap::new();
    for report in reports.read() {
        inbox.entry(report.squad()).or_default().push(*report);
    }

    let mut tick = SquadTick {
        registry: &registry,
        spatial: spatial.query(),
        visibility: Visibility {
            spatial: spatial.query(),
            frame: frame.index,
            invalidation_distance: config.los_invalidation_distance,
        },
        config: &config,
        reservations: &mut *reservations,
        orders: Vec::new(),
        delta: time.delta_secs(),
    };

    for (entity, mut squad, mut state) in squads.iter_mut() {
        if *state == SquadState::Disbanded {
            crate::logger::log(&format!("🪦 Squad {:?} despawned", entity));
            commands.entity(entity).despawn();
            continue;
        }

        let (roster, lost) = gather_roster(&mut squad, &members, &mut tick);

        if roster.is_empty() {
            crate::logger::log_warning(&format!(
                "Squad {:?}: no members left → disbanded",
                entity
            ));
            squad.disband();
            crate::logger::log(&format!(
                "Squad: {:?} {} → {}",
                entity,
                state.name(),
                SquadState::Disbanded.name()
            ));
            *state = SquadState::Disbanded;
            continue;
        }

        let mut controller = SquadController {
            entity,
            squad,
            state,
            roster,
            members: &mut members,
        };
        controller.tick(lost, inbox.remove(&entity).unwrap_or_default(), &mut tick);
    }

    for order in tick.orders {
        order_events.write(order);
    }
}

/// Живые участники в порядке вставки; мёртвые/удалённые выбрасываются
fn gather_roster(
    squad: &mut Squad,
    members: &MemberQuery,
    tick: &mut SquadTick,
) -> (Vec<ArcMember>, bool) {
    let mut roster = Vec::with_capacity(squad.members().len());
    let mut lost = false;

    for agent in squad.members().to_vec() {
        match members.get(agent) {
            Ok((transform, offsets, state, _, _, _)) if !state.is_dead() => roster.push(ArcMember {
                agent,
                position: transform.translation,
                offsets: *offsets,
            }),
            _ => {
                squad.remove_member(agent);
                tick.reservations.release(agent);
                lost = true;
                crate::logger::log(&format!("Squad: member {:?} lost", agent));
            }
        }
    }

    (roster, lost)
}

struct SquadController<'a, 'w, 's> {
    entity: Entity,
    squad: Mut<'a, Squad>,
    state: Mut<'a, SquadState>,
    roster: Vec<ArcMember>,
    members: &'a mut MemberQuery<'w, 's>,
}

impl SquadController<'_, '_, '_> {
    fn tick(&mut self, lost: bool, reports: Vec<SquadReport>, tick: &mut SquadTick) {
        // Отчёты относятся к приказам прошлых тиков → до нового приказа
        for report in reports {
            self.handle_report(report, tick);
        }

        // Новый приказ: агенты получат его в этом же тике, оценка состояния — в следующем
        if let Some(command) = self.squad.pending_command.take() {
            self.apply_command(command, tick);
            return;
        }

        match self.state.clone() {
            SquadState::Idle => self.update_idle(tick),
            SquadState::MovingToPoint { point } => self.update_moving(point, tick),
            SquadState::FollowingPath { index, forward } => {
                self.update_following(index, forward, tick)
            }
            SquadState::Combat { target } => self.update_combat(target, lost, tick),
            SquadState::Pursuit {
                target,
                last_known,
                timer,
            } => self.update_pursuit(target, last_known, timer, tick),
            SquadState::Disbanded => {}
        }
    }

    fn agents(&self) -> Vec<Entity> {
        self.roster.iter().map(|m| m.agent).collect()
    }

    fn centroid(&self) -> Vec3 {
        self.roster.iter().map(|m| m.position).sum::<Vec3>() / self.roster.len() as f32
    }

    fn order(&self, tick: &mut SquadTick, agent: Entity, order: AgentOrder) {
        tick.orders.push(SquadOrder { agent, order });
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn transition(&mut self, next: SquadState, tick: &mut SquadTick) {
        crate::logger::log(&format!(
            "Squad: {:?} {} → {}",
            self.entity,
            self.state.name(),
            next.name()
        ));

        // Цель больше никому не нужна → очищаем синхронно, резервации отпускаем
        if self.state.is_engaged() && !next.is_engaged() {
            self.squad.target = None;
            self.squad.last_known_target_position = None;
            self.squad.plan = None;
            tick.reservations.release_all(&self.agents());
            for agent in self.agents() {
                self.order(tick, agent, AgentOrder::Disengage);
            }
        }

        self.squad.awaiting.clear();
        *self.state = next;

        match self.state.clone() {
            SquadState::MovingToPoint { point } => self.issue_formation_move(point, tick),
            SquadState::FollowingPath { index, .. } => {
                if let Some(&waypoint) = self.squad.path().get(index) {
                    self.issue_formation_move(waypoint, tick);
                }
            }
            SquadState::Pursuit { last_known, .. } => self.issue_formation_move(last_known, tick),
            _ => {}
        }
    }

    /// Состояние миссии (возврат после боя)
    fn mission_state(&self) -> SquadState {
        match self.squad.route() {
            Some(_) => {
                let (index, forward) = self.squad.route_progress;
                SquadState::FollowingPath { index, forward }
            }
            None => SquadState::Idle,
        }
    }

    fn resume_mission(&mut self, tick: &mut SquadTick) {
        let next = self.mission_state();
        self.transition(next, tick);
    }

    /// Формация к точке: слоты развёрнуты по направлению движения
    fn issue_formation_move(&mut self, point: Vec3, tick: &mut SquadTick) {
        let centroid = self.centroid();
        let heading = Vec3::new(point.x - centroid.x, 0.0, point.z - centroid.z);
        let anchor = formation_anchor(point, point + heading);

        let agents: Vec<(Entity, Vec3)> = self.roster.iter().map(|m| (m.agent, m.position)).collect();
        let slots = self.squad.formation(tick.config).offsets(agents.len());

        self.squad.awaiting.clear();
        for assignment in optimal_assignments(&agents, &slots, &anchor) {
            let slot = tick.spatial.nearest_walkable_point(assignment.position);
            self.order(tick, assignment.agent, AgentOrder::MoveTo { point: slot });
            self.squad.await_arrival(assignment.agent, slot);
        }
    }

    /// Формация дошла: все отчитались или центроид в радиусе точки
    fn arrived(&self, point: Vec3, tick: &SquadTick) -> bool {
        self.squad.awaiting.is_empty()
            || horizontal_distance(self.centroid(), point) <= tick.config.squad_arrival_radius
    }

    // ------------------------------------------------------------------
    // External inputs
    // ------------------------------------------------------------------

    fn apply_command(&mut self, command: SquadCommand, tick: &mut SquadTick) {
        match command {
            SquadCommand::MoveTo(point) => {
                crate::logger::log(&format!("Squad: {:?} ordered to move to {:?}", self.entity, point));
                self.transition(SquadState::MovingToPoint { point }, tick);
            }
            SquadCommand::Attack(target) => match self.assign_combat_target(target, tick) {
                Ok(()) => {}
                // Манёвр ещё идёт: приказ отклонён, текущий бой продолжается
                Err(OrderError::ReservationConflict) => {}
                Err(_) if self.state.is_engaged() => {
                    // Невалидный приказ → disengage fallback
                    self.resume_mission(tick);
                }
                Err(_) => {}
            },
        }
    }

    fn handle_report(&mut self, report: SquadReport, tick: &mut SquadTick) {
        match report {
            SquadReport::PositionReached { agent, point, .. } => {
                if !self.squad.mark_arrived(agent, point) {
                    crate::logger::log(&format!(
                        "Squad: {:?} stale arrival of {:?} at {:?} ignored",
                        self.entity, agent, point
                    ));
                }
            }
            SquadReport::TargetEliminated { agent, target, .. } => {
                if self.state.is_engaged() && self.squad.target == Some(target) {
                    crate::logger::log(&format!(
                        "💀 Squad {:?}: {:?} reports {:?} eliminated",
                        self.entity, agent, target
                    ));
                    self.resume_mission(tick);
                }
            }
            SquadReport::RepositionRequested { agent, .. } => {
                if let SquadState::Combat { target } = *self.state {
                    self.reposition(agent, target, tick);
                }
            }
        }
    }

    /// Новая позиция для одного участника (остальные не трогаем)
    fn reposition(&mut self, agent: Entity, target: Entity, tick: &mut SquadTick) {
        let Some(snapshot) = tick.registry.live(target) else {
            return;
        };
        let Some(member) = self.roster.iter().find(|m| m.agent == agent).copied() else {
            return;
        };

        let ignore = self.agents();
        let request = SearchRequest {
            agent,
            position: member.position,
            offsets: member.offsets,
            target: snapshot,
            radius: tick.config.search_radius,
            step: tick.config.search_step,
            ignore: &ignore,
        };

        tick.reservations.release(agent);
        let position = tick
            .config
            .search_strategy
            .find(tick.spatial, &request, Some(&*tick.reservations))
            .map(|p| p.point);
        match position {
            Some(point) => {
                tick.reservations.reserve(agent, point);
                self.squad.await_arrival(agent, point);
            }
            None => {
                self.squad.awaiting.retain(|&(a, _)| a != agent);
            }
        }

        crate::logger::log(&format!(
            "Squad: {:?} reposition {:?} → {:?}",
            self.entity, agent, position
        ));
        self.order(tick, agent, AgentOrder::Engage { target, position });
    }

    // ------------------------------------------------------------------
    // Combat planning
    // ------------------------------------------------------------------

    /// AssignCombatTarget: позиции по fallback chain + Engage приказы
    ///
    /// Пока кто-то из участников держит резервацию (идёт на позицию),
    /// re-plan отклоняется с ReservationConflict и ничего не меняется.
    fn assign_combat_target(&mut self, target: Entity, tick: &mut SquadTick) -> Result<(), OrderError> {
        let Some(snapshot) = tick.registry.live_hostile(target, self.squad.faction_id).cloned() else {
            crate::logger::log_warning(&format!(
                "Squad {:?}: invalid target {:?} ignored",
                self.entity, target
            ));
            return Err(OrderError::InvalidTarget(target));
        };

        let agents = self.agents();
        let formation = self.squad.formation(tick.config);
        let plan = plan_engagement(
            tick.spatial,
            &self.roster,
            &snapshot,
            &formation,
            tick.reservations,
            tick.config,
        );

        if let Err(err) = tick
            .reservations
            .request_positions_for_squad(&agents, &plan.assigned())
        {
            crate::logger::log_warning(&format!(
                "Squad {:?}: attack on {:?} refused ({})",
                self.entity, target, err
            ));
            return Err(err);
        }
        let positions = plan.positions.clone();

        crate::logger::log(&format!(
            "⚔️ Squad {:?} engages {:?} ({:?})",
            self.entity, target, plan.plan
        ));

        if *self.state != (SquadState::Combat { target }) {
            self.transition(SquadState::Combat { target }, tick);
        }

        self.squad.target = Some(target);
        self.squad.last_known_target_position = Some(snapshot.position);
        self.squad.plan = Some(plan.plan);
        self.squad.awaiting = positions
            .iter()
            .filter_map(|&(agent, point)| point.map(|p| (agent, p)))
            .collect();

        for (agent, position) in positions {
            self.order(tick, agent, AgentOrder::Engage { target, position });
        }
        Ok(())
    }

    /// Re-plan с нуля: старые резервации сквада больше не нужны
    fn replan(&mut self, target: Entity, tick: &mut SquadTick) {
        tick.reservations.release_all(&self.agents());
        if self.assign_combat_target(target, tick).is_err() {
            self.resume_mission(tick);
        }
    }

    /// Участники, бросившие преследование, пока сквад ещё в бою
    fn rejoin_idle_members(&mut self, target: Entity, tick: &mut SquadTick) {
        let idle: Vec<Entity> = self
            .roster
            .iter()
            .map(|m| m.agent)
            .filter(|&agent| {
                self.members.get(agent).is_ok_and(|(_, _, state, caps, _, _)| {
                    caps.combat && !state.is_engaged() && !state.is_dead()
                })
            })
            .filter(|&agent| !tick.orders.iter().any(|o| o.agent == agent))
            .collect();

        for agent in idle {
            crate::logger::log(&format!(
                "Squad: {:?} sends {:?} back into the fight",
                self.entity, agent
            ));
            self.reposition(agent, target, tick);
        }
    }

    /// Лучшая цель по сенсорам всех участников
    fn detect_contact(&mut self, tick: &SquadTick) -> Option<ThreatScore> {
        let mut best: Option<ThreatScore> = None;

        for member in &self.roster {
            let Ok((transform, offsets, _, _, sensor, mut cache)) = self.members.get_mut(member.agent) else {
                continue;
            };
            let Some(sensor) = sensor else {
                continue;
            };

            let observer = Observer {
                entity: member.agent,
                faction_id: self.squad.faction_id,
                eye: offsets.eye_point(transform),
            };
            let candidate = best_target(
                &observer,
                &sensor.detected,
                tick.registry,
                &tick.visibility,
                &mut cache,
                tick.config,
            );

            if let Some(score) = candidate {
                if best.is_none_or(|b| score.score > b.score) {
                    best = Some(score);
                }
            }
        }

        best
    }

    fn any_member_sees(&mut self, target: &TargetSnapshot, tick: &SquadTick) -> bool {
        for member in &self.roster {
            let Ok((transform, offsets, _, _, _, mut cache)) = self.members.get_mut(member.agent) else {
                continue;
            };
            if cache
                .first_visible_point(&tick.visibility, offsets.eye_point(transform), target, &[member.agent])
                .is_some()
            {
                return true;
            }
        }
        false
    }

    fn try_engage_contact(&mut self, tick: &mut SquadTick) -> bool {
        match self.detect_contact(tick) {
            Some(best) => self.assign_combat_target(best.target, tick).is_ok(),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // State updates
    // ------------------------------------------------------------------

    fn update_idle(&mut self, tick: &mut SquadTick) {
        if self.try_engage_contact(tick) {
            return;
        }

        if self.squad.route().is_some() {
            let next = self.mission_state();
            self.transition(next, tick);
        }
    }

    fn update_moving(&mut self, point: Vec3, tick: &mut SquadTick) {
        if self.try_engage_contact(tick) {
            return;
        }

        if self.arrived(point, tick) {
            self.transition(SquadState::Idle, tick);
        }
    }

    fn update_following(&mut self, index: usize, forward: bool, tick: &mut SquadTick) {
        if self.try_engage_contact(tick) {
            return;
        }

        let Some(route) = self.squad.route() else {
            self.transition(SquadState::Idle, tick);
            return;
        };
        let Some(&waypoint) = route.waypoints.get(index) else {
            return;
        };
        if !self.arrived(waypoint, tick) {
            return;
        }

        // Assault: на последней точке стоим (awaiting пуст, приказов нет)
        if let Some((next_index, next_forward)) = route.advance(index, forward) {
            self.squad.route_progress = (next_index, next_forward);
            self.state.set_if_neq(SquadState::FollowingPath {
                index: next_index,
                forward: next_forward,
            });
            if let Some(&next_point) = route.waypoints.get(next_index) {
                self.issue_formation_move(next_point, tick);
            }
        }
    }

    fn update_combat(&mut self, target: Entity, lost: bool, tick: &mut SquadTick) {
        let Some(snapshot) = tick.registry.live(target).cloned() else {
            crate::logger::log(&format!(
                "Squad: {:?} target {:?} gone → resume mission",
                self.entity, target
            ));
            self.resume_mission(tick);
            return;
        };

        if lost {
            crate::logger::log(&format!(
                "Squad: {:?} lost a member → re-planning positions",
                self.entity
            ));
            self.replan(target, tick);
            return;
        }

        if self.any_member_sees(&snapshot, tick) {
            self.squad.last_known_target_position = Some(snapshot.position);
            self.rejoin_idle_members(target, tick);
            return;
        }

        // Пока участники идут на позиции — не дёргаемся
        if !self.squad.awaiting.is_empty() {
            return;
        }

        let last_known = self
            .squad
            .last_known_target_position
            .unwrap_or(snapshot.position);
        self.transition(
            SquadState::Pursuit {
                target,
                last_known,
                timer: tick.config.squad_pursuit_timeout,
            },
            tick,
        );
    }

    fn update_pursuit(&mut self, target: Entity, last_known: Vec3, timer: f32, tick: &mut SquadTick) {
        let Some(snapshot) = tick.registry.live(target).cloned() else {
            self.resume_mission(tick);
            return;
        };

        if self.any_member_sees(&snapshot, tick) {
            self.replan(target, tick);
            return;
        }

        let remaining = timer - tick.delta;
        if remaining <= 0.0 || self.arrived(last_known, tick) {
            crate::logger::log(&format!(
                "Squad: {:?} pursuit of {:?} gave up",
                self.entity, target
            ));
            self.resume_mission(tick);
            return;
        }

        self.state.set_if_neq(SquadState::Pursuit {
            target,
            last_known,
            timer: remaining,
        });
    }
}

/// Привязать агентов к скваду (до первого тика: default behavior выбирается при инициализации)
pub fn attach_members(world: &mut World, squad: Entity, agents: &[Entity]) {
    for &agent in agents {
        if let Ok(mut entity) = world.get_entity_mut(agent) {
            entity.insert(SquadMember { squad });
        }
    }
    if let Some(mut component) = world.get_mut::<Squad>(squad) {
        for &agent in agents {
            component.add_member(agent);
        }
    }
}
