//! Интеграционные тесты Squad FSM: приказы, контакт, потери, роспуск

use bevy::prelude::*;
use std::time::Duration;
use tactical_ai::squad::CombatPlan;
use tactical_ai::*;

const DT: Duration = Duration::from_millis(50);

struct Scenario {
    app: App,
    squad: Entity,
    members: Vec<Entity>,
    enemy: Entity,
}

impl Scenario {
    fn new(mission: MissionMode, path: Vec<Vec3>) -> Self {
        Self::build(mission, path, ArenaWorld::open_field(), TacticalConfig::default())
    }

    fn build(mission: MissionMode, path: Vec<Vec3>, arena: ArenaWorld, config: TacticalConfig) -> Self {
        let mut app = create_headless_app(11);
        app.add_plugins(TacticalPlugin::new(config));
        app.insert_resource(SpatialOracle::new(arena));
        app.insert_resource(NavigationOracle::new(StraightLineNavigator::default()));

        let members: Vec<Entity> = [-2.0, 0.0, 2.0]
            .into_iter()
            .map(|x| {
                app.world_mut()
                    .spawn((
                        Agent::new(),
                        Actor::new(1),
                        Transform::from_xyz(x, 0.0, 20.0),
                        TargetSensor::default(),
                        NavigationAgent::default(),
                        CombatStrategy::new(RangedSkirmisher::default()),
                    ))
                    .id()
            })
            .collect();

        let squad = app
            .world_mut()
            .spawn(Squad::new(1, mission).with_path(path))
            .id();
        attach_members(app.world_mut(), squad, &members);

        let enemy = app
            .world_mut()
            .spawn((Actor::new(2), Transform::from_xyz(0.0, 0.0, 0.0)))
            .id();

        let mut scenario = Self {
            app,
            squad,
            members,
            enemy,
        };
        // Первый тик: инициализация агентов + TargetRegistry
        scenario.tick(1);
        scenario
    }

    fn standby() -> Self {
        Self::new(MissionMode::Standby, Vec::new())
    }

    /// Стена между сквадом (z = 20) и целью (origin): позиции только с флангов
    fn walled() -> Self {
        let wall = Obstacle::new(Vec3::new(-4.0, 0.0, 9.0), Vec3::new(4.0, 3.0, 10.0));
        Self::build(
            MissionMode::Standby,
            Vec::new(),
            ArenaWorld::open_field().with_obstacle(wall),
            TacticalConfig::default(),
        )
    }

    /// Стена за целью: отойдя на z = -10, цель пропадает из вида
    fn backstop(config: TacticalConfig) -> Self {
        let wall = Obstacle::new(Vec3::new(-30.0, 0.0, -6.0), Vec3::new(30.0, 4.0, -5.0));
        Self::build(
            MissionMode::Standby,
            Vec::new(),
            ArenaWorld::open_field().with_obstacle(wall),
            config,
        )
    }

    fn tick(&mut self, count: usize) {
        for _ in 0..count {
            run_tactical_tick(&mut self.app, DT);
        }
    }

    fn squad(&self) -> &Squad {
        self.app.world().get::<Squad>(self.squad).unwrap()
    }

    fn state(&self) -> SquadState {
        self.app.world().get::<SquadState>(self.squad).cloned().unwrap()
    }

    fn agent_state(&self, agent: Entity) -> AgentState {
        self.app.world().get::<AgentState>(agent).cloned().unwrap()
    }

    fn order_attack(&mut self, target: Entity) -> Result<(), OrderError> {
        let registry = self.app.world().resource::<TargetRegistry>().clone();
        self.app
            .world_mut()
            .get_mut::<Squad>(self.squad)
            .unwrap()
            .order_attack(target, &registry)
    }

    fn order_move(&mut self, point: Vec3) -> Result<(), OrderError> {
        self.app
            .world_mut()
            .get_mut::<Squad>(self.squad)
            .unwrap()
            .order_move(point)
    }

    fn position(&self, entity: Entity) -> Vec3 {
        self.app.world().get::<Transform>(entity).unwrap().translation
    }

    fn centroid(&self) -> Vec3 {
        self.members.iter().map(|&a| self.position(a)).sum::<Vec3>() / self.members.len() as f32
    }

    fn reservations(&self) -> Vec<Option<Vec3>> {
        let table = self.app.world().resource::<PositionReservations>();
        self.members.iter().map(|&a| table.reservation_of(a)).collect()
    }

    fn spawn_enemy(&mut self, position: Vec3) -> Entity {
        let enemy = self
            .app
            .world_mut()
            .spawn((Actor::new(2), Transform::from_translation(position)))
            .id();
        self.tick(1);
        enemy
    }

    fn kill(&mut self, entity: Entity) {
        self.app
            .world_mut()
            .get_mut::<Health>(entity)
            .unwrap()
            .take_damage(u32::MAX);
    }
}

#[test]
fn test_attack_order_engages_all_members() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(1);

    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.squad().target, Some(s.enemy));
    // Открытое поле: cover search находит позиции всем
    assert_eq!(s.squad().plan, Some(CombatPlan::Cover));

    for &agent in &s.members {
        assert_eq!(s.agent_state(agent), AgentState::Attack { target: s.enemy });
    }
}

#[test]
fn test_member_contact_triggers_squad_engagement() {
    let mut s = Scenario::standby();
    let spotter = s.members[1];
    s.app.world_mut().send_event(SensorEvent::TargetDetected {
        observer: spotter,
        target: s.enemy,
    });
    s.tick(1);

    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    // Сквад назначает цель всем, не только заметившему
    for &agent in &s.members {
        assert_eq!(s.agent_state(agent), AgentState::Attack { target: s.enemy });
    }
}

#[test]
fn test_invalid_attack_order_rejected() {
    let mut s = Scenario::standby();
    let friend = s.members[0];

    assert_eq!(s.order_attack(friend), Err(OrderError::InvalidTarget(friend)));
    s.tick(1);
    assert_eq!(s.state(), SquadState::Idle);
}

#[test]
fn test_member_death_replans_positions() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(1);

    let fallen = s.members[0];
    s.kill(fallen);
    s.tick(1);

    assert_eq!(s.agent_state(fallen), AgentState::Dead);
    assert_eq!(s.squad().members().len(), 2);
    assert!(!s.squad().members().contains(&fallen));
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });

    let reservations = s.app.world().resource::<PositionReservations>();
    assert!(!reservations.has_reservation(fallen));
}

#[test]
fn test_target_elimination_returns_to_mission() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(1);

    s.kill(s.enemy);
    s.tick(2);

    assert_eq!(s.state(), SquadState::Idle);
    assert_eq!(s.squad().target, None);
    assert_eq!(s.squad().plan, None);

    let reservations = s.app.world().resource::<PositionReservations>();
    for &agent in &s.members {
        assert!(!reservations.has_reservation(agent));
        assert!(!s.agent_state(agent).is_engaged());
    }
}

#[test]
fn test_squad_disbands_when_all_members_die() {
    let mut s = Scenario::standby();
    for agent in s.members.clone() {
        s.kill(agent);
    }
    s.tick(1);

    assert_eq!(s.state(), SquadState::Disbanded);
    assert!(s.squad().is_disbanded());
    assert_eq!(s.order_move(Vec3::ZERO), Err(OrderError::SquadDisbanded));
    assert_eq!(s.order_attack(s.enemy), Err(OrderError::SquadDisbanded));

    // Следующий тик: entity сквада удалена
    s.tick(1);
    assert!(s.app.world().get_entity(s.squad).is_err());
}

#[test]
fn test_move_order_reaches_point_in_formation() {
    let mut s = Scenario::standby();
    let point = Vec3::new(0.0, 0.0, 10.0);
    s.order_move(point).unwrap();
    s.tick(1);

    assert_eq!(s.state(), SquadState::MovingToPoint { point });
    for &agent in &s.members {
        assert!(matches!(s.agent_state(agent), AgentState::Regroup { .. }));
    }

    // 10м при 3 м/с
    s.tick(120);
    assert_eq!(s.state(), SquadState::Idle);
    for &agent in &s.members {
        let position = s.app.world().get::<Transform>(agent).unwrap().translation;
        assert!(position.distance(point) < 5.0);
    }
}

#[test]
fn test_follow_path_mission_advances_waypoints() {
    let path = vec![Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, 0.0, 40.0)];
    let mut s = Scenario::new(MissionMode::FollowPath, path);
    // Враг далеко за спиной и никем не замечен

    assert_eq!(s.state(), SquadState::FollowingPath { index: 0, forward: true });

    // Центроид уже на первой точке → сразу ко второй
    s.tick(1);
    assert_eq!(s.state(), SquadState::FollowingPath { index: 1, forward: true });
    for &agent in &s.members {
        assert!(matches!(
            s.agent_state(agent),
            AgentState::Regroup { point } if point.z > 39.0
        ));
    }
}

#[test]
fn test_members_walk_to_flank_posts_without_sight() {
    let mut s = Scenario::walled();
    s.order_attack(s.enemy).unwrap();
    s.tick(1);

    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.squad().plan, Some(CombatPlan::Cover));
    let posts = s.reservations();
    for (&agent, post) in s.members.iter().zip(&posts) {
        assert_eq!(s.agent_state(agent), AgentState::Attack { target: s.enemy });
        assert!(post.is_some(), "{:?} has no post", agent);
    }

    // Из-за стены никто не видит цель, но все идут на посты
    s.tick(5);
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.reservations(), posts);
    for &agent in &s.members {
        assert_eq!(s.agent_state(agent), AgentState::Attack { target: s.enemy });
    }

    // 9м при 3 м/с
    s.tick(120);
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    for (&agent, post) in s.members.iter().zip(&posts) {
        let post = post.unwrap();
        assert!(s.position(agent).distance(post) < 1.0, "{:?} short of {:?}", agent, post);
    }
    assert!(s.reservations().iter().all(Option::is_none));
    assert!(!s.app.world().resource::<Events<WeaponFireIntent>>().is_empty());
}

#[test]
fn test_attack_order_refused_while_members_hold_posts() {
    let mut s = Scenario::walled();
    let second = s.spawn_enemy(Vec3::new(0.0, 0.0, -5.0));
    s.order_attack(s.enemy).unwrap();
    s.tick(5);
    let posts = s.reservations();

    // Участники ещё в пути: re-plan запрещён, бой продолжается
    s.order_attack(second).unwrap();
    s.tick(1);
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.squad().target, Some(s.enemy));
    assert_eq!(s.reservations(), posts);

    // Все на постах, резервации отпущены → новый приказ принят
    s.tick(120);
    assert!(s.reservations().iter().all(Option::is_none));
    s.order_attack(second).unwrap();
    s.tick(1);
    assert_eq!(s.state(), SquadState::Combat { target: second });
    assert_eq!(s.squad().target, Some(second));
}

#[test]
fn test_squad_pursuit_gives_up_on_timeout() {
    let config = TacticalConfig {
        squad_pursuit_timeout: 1.0,
        ..Default::default()
    };
    let mut s = Scenario::backstop(config);
    s.order_attack(s.enemy).unwrap();
    s.tick(20);
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });

    // Цель ушла за стену
    s.app.world_mut().get_mut::<Transform>(s.enemy).unwrap().translation = Vec3::new(0.0, 0.0, -10.0);
    s.tick(1);

    match s.state() {
        SquadState::Pursuit { target, last_known, .. } => {
            assert_eq!(target, s.enemy);
            assert_eq!(last_known, Vec3::ZERO);
        }
        other => panic!("expected Pursuit, got {:?}", other),
    }
    for &agent in &s.members {
        assert!(matches!(s.agent_state(agent), AgentState::Regroup { .. }));
    }

    // 1 сек таймер, до точки ещё далеко
    s.tick(25);
    assert_eq!(s.state(), SquadState::Idle);
    assert_eq!(s.squad().target, None);
    assert!(s.centroid().z > 5.0);
}

#[test]
fn test_squad_pursuit_ends_at_last_known_position() {
    let config = TacticalConfig {
        squad_pursuit_timeout: 30.0,
        ..Default::default()
    };
    let mut s = Scenario::backstop(config);
    s.order_attack(s.enemy).unwrap();
    s.tick(20);

    s.app.world_mut().get_mut::<Transform>(s.enemy).unwrap().translation = Vec3::new(0.0, 0.0, -10.0);
    s.tick(1);
    assert!(matches!(s.state(), SquadState::Pursuit { .. }));

    // ~20м при 3 м/с
    s.tick(200);
    assert_eq!(s.state(), SquadState::Idle);
    let centroid = s.centroid();
    assert!(Vec3::new(centroid.x, 0.0, centroid.z).length() < 2.0, "centroid {:?}", centroid);
}

#[test]
fn test_reposition_request_assigns_new_post() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(20);
    let blocked = s.members[1];
    assert!(!s.app.world().resource::<PositionReservations>().has_reservation(blocked));

    s.app.world_mut().send_event(SquadReport::RepositionRequested {
        squad: s.squad,
        agent: blocked,
    });
    s.tick(1);

    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.agent_state(blocked), AgentState::Attack { target: s.enemy });
    let table = s.app.world().resource::<PositionReservations>();
    assert!(table.has_reservation(blocked));
    for &other in s.members.iter().filter(|&&a| a != blocked) {
        assert!(!table.has_reservation(other));
    }
}

#[test]
fn test_elimination_of_other_target_is_ignored() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(1);

    let bystander = s.app.world_mut().spawn_empty().id();
    s.app.world_mut().send_event(SquadReport::TargetEliminated {
        squad: s.squad,
        agent: s.members[0],
        target: bystander,
    });
    s.tick(1);

    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });
    assert_eq!(s.squad().target, Some(s.enemy));
}

#[test]
fn test_assault_path_stops_at_last_waypoint() {
    let path = vec![Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, 0.0, 26.0)];
    let mut s = Scenario::new(MissionMode::AssaultPath, path);

    // 6м при 3 м/с
    s.tick(100);
    assert_eq!(s.state(), SquadState::FollowingPath { index: 1, forward: true });
    let parked: Vec<Vec3> = s.members.iter().map(|&a| s.position(a)).collect();
    for position in &parked {
        assert!(position.z > 24.0, "member at {:?}", position);
    }

    s.tick(40);
    assert_eq!(s.state(), SquadState::FollowingPath { index: 1, forward: true });
    for (&agent, before) in s.members.iter().zip(&parked) {
        assert!(s.position(agent).distance(*before) < 1e-3);
    }
}

#[test]
fn test_default_formation_spacing_from_config() {
    let config = TacticalConfig {
        formation_spacing: 4.0,
        ..Default::default()
    };
    let mut s = Scenario::build(MissionMode::Standby, Vec::new(), ArenaWorld::open_field(), config);
    s.order_move(Vec3::new(0.0, 0.0, 10.0)).unwrap();
    s.tick(1);

    let mut xs: Vec<f32> = s
        .members
        .iter()
        .filter_map(|&a| match s.agent_state(a) {
            AgentState::Regroup { point } => Some(point.x),
            _ => None,
        })
        .collect();
    xs.sort_by(f32::total_cmp);
    assert_eq!(xs.len(), 3);
    assert!((xs[1] - xs[0] - 4.0).abs() < 1e-3, "slots {:?}", xs);
    assert!((xs[2] - xs[1] - 4.0).abs() < 1e-3, "slots {:?}", xs);
}

#[test]
fn test_combat_squad_sends_idle_member_back_into_fight() {
    let mut s = Scenario::standby();
    s.order_attack(s.enemy).unwrap();
    s.tick(20);

    // Участник выпал из боя (например, бросил преследование)
    let straggler = s.members[2];
    s.app.world_mut().send_event(SquadOrder {
        agent: straggler,
        order: AgentOrder::Disengage,
    });
    s.tick(1);
    assert!(matches!(s.agent_state(straggler), AgentState::Vigilance { .. }));
    assert_eq!(s.state(), SquadState::Combat { target: s.enemy });

    s.tick(1);
    assert_eq!(s.agent_state(straggler), AgentState::Attack { target: s.enemy });
}
