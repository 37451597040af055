//! Headless demo тактического ядра
//!
//! Сквад штурмует позицию часового за стеной, турель с оператором прикрывает.
//! Trigger volumes и урон эмулируются простыми системами поверх ядра.

use bevy::prelude::*;
use std::time::Duration;
use tactical_ai::logger::{log_info, set_log_level, LogLevel};
use tactical_ai::*;

/// Радиус эмулируемого trigger volume (метры)
const SENSOR_RADIUS: f32 = 18.0;
/// Урон одного WeaponFireIntent
const SHOT_DAMAGE: u32 = 12;
const TICK_COUNT: usize = 1200;

fn main() {
    let seed = 42;
    println!("Starting tactical AI headless demo (seed: {})", seed);

    let mut app = create_headless_app(seed);
    set_log_level(LogLevel::Info);

    let config = match TacticalConfig::from_ron_str("(search_radius: 12.0, engagement_distance: 14.0)") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Tuning rejected: {} → defaults", err);
            TacticalConfig::default()
        }
    };

    app.add_plugins(TacticalPlugin::new(config))
        .add_systems(
            FixedUpdate,
            (emulate_trigger_volumes, resolve_weapon_fire)
                .chain()
                .before(tactical_ai::perception::advance_frame),
        );

    let arena = ArenaWorld::open_field()
        .with_bounds(Vec2::new(-40.0, -40.0), Vec2::new(40.0, 40.0))
        // Стена перед часовым
        .with_obstacle(Obstacle::new(Vec3::new(-5.0, 0.0, -6.0), Vec3::new(5.0, 2.5, -5.0)))
        // Укрытие по пути сквада
        .with_obstacle(Obstacle::new(Vec3::new(6.0, 0.0, 6.0), Vec3::new(8.0, 1.5, 7.0)));
    app.insert_resource(SpatialOracle::new(arena));
    app.insert_resource(NavigationOracle::new(StraightLineNavigator::default()));

    let squad = spawn_assault_squad(&mut app);
    spawn_defenders(&mut app);

    let mut last_state = None;
    for tick in 0..TICK_COUNT {
        run_tactical_tick(&mut app, Duration::from_secs_f32(1.0 / 20.0));

        let state = app.world().get::<SquadState>(squad).cloned();
        if state != last_state {
            log_info(&format!("Tick {}: squad state {:?}", tick, state));
            last_state = state;
        }

        if tick % 100 == 0 {
            let alive = alive_by_faction(app.world_mut());
            println!("Tick {}: alive {:?}", tick, alive);
        }
    }

    let alive = alive_by_faction(app.world_mut());
    println!("Simulation complete! Survivors by faction: {:?}", alive);
}

fn spawn_assault_squad(app: &mut App) -> Entity {
    let members: Vec<Entity> = (0..4)
        .map(|i| {
            app.world_mut()
                .spawn((
                    Agent::new(),
                    Actor::new(1),
                    Transform::from_xyz(-3.0 + i as f32 * 2.0, 0.0, 30.0),
                    SightPoints::new(vec![Vec3::new(0.0, 1.7, 0.0), Vec3::new(0.0, 1.0, 0.0)]),
                    TargetSensor::default(),
                    NavigationAgent::default(),
                    CombatStrategy::new(RangedSkirmisher::default()),
                ))
                .id()
        })
        .collect();

    let squad = app
        .world_mut()
        .spawn(
            Squad::new(1, MissionMode::AssaultPath)
                .with_path(vec![
                    Vec3::new(0.0, 0.0, 30.0),
                    Vec3::new(4.0, 0.0, 15.0),
                    Vec3::new(0.0, 0.0, 5.0),
                ])
                .with_formation(Formation::new(FormationShape::Wedge, 2.5)),
        )
        .id();
    attach_members(app.world_mut(), squad, &members);
    squad
}

fn spawn_defenders(app: &mut App) {
    // Часовой за стеной
    app.world_mut().spawn((
        Agent::new(),
        Actor::new(2),
        Transform::from_xyz(0.0, 0.0, -10.0),
        Targetable { base_threat: 1.5 },
        TargetSensor::default(),
        NavigationAgent::default(),
        CombatStrategy::new(RangedSkirmisher::new(20.0, 1.0)),
    ));

    // Охранник ближнего боя
    app.world_mut().spawn((
        Agent::new(),
        Actor::new(2),
        Transform::from_xyz(-8.0, 0.0, -8.0),
        TargetSensor::default(),
        NavigationAgent::default(),
        CombatStrategy::new(MeleeRusher::default()),
    ));

    // Турель с оператором
    let turret = app
        .world_mut()
        .spawn((Actor::new(2), Health::new(200), Transform::from_xyz(10.0, 0.0, -8.0)))
        .id();
    let operator = app
        .world_mut()
        .spawn((
            Actor::new(2),
            Transform::from_xyz(10.0, 0.0, -9.0),
            OperatingTurret(turret),
        ))
        .id();
    app.world_mut().entity_mut(turret).insert(Turret {
        occupant: Some(operator),
        autonomous: false,
    });
}

/// Эмуляция trigger volume: enter/exit по дистанции
fn emulate_trigger_volumes(
    observers: Query<(Entity, &Transform, &Actor, &Health, &TargetSensor)>,
    actors: Query<(Entity, &Transform, &Actor, &Health)>,
    mut events: EventWriter<SensorEvent>,
) {
    for (observer, transform, actor, health, sensor) in observers.iter() {
        if !health.is_alive() {
            continue;
        }
        for (target, target_transform, target_actor, target_health) in actors.iter() {
            if !actor.is_hostile_to(target_actor) || !target_health.is_alive() {
                continue;
            }
            let inside = transform.translation.distance(target_transform.translation) <= SENSOR_RADIUS;
            match (inside, sensor.contains(target)) {
                (true, false) => {
                    events.write(SensorEvent::TargetDetected { observer, target });
                }
                (false, true) => {
                    events.write(SensorEvent::TargetLost { observer, target });
                }
                _ => {}
            }
        }
    }
}

/// Эмуляция damage коллаборатора: каждый intent попадает
fn resolve_weapon_fire(
    mut intents: EventReader<WeaponFireIntent>,
    mut targets: Query<(&mut Health, Has<Agent>)>,
    positions: Query<&Transform>,
    mut damage: EventWriter<DamageTaken>,
) {
    for intent in intents.read() {
        let Ok((mut health, is_agent)) = targets.get_mut(intent.target) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }
        health.take_damage(SHOT_DAMAGE);

        if is_agent {
            damage.write(DamageTaken {
                agent: intent.target,
                source: Some(intent.shooter),
                amount: SHOT_DAMAGE,
                source_position: positions.get(intent.shooter).ok().map(|t| t.translation),
            });
        }
    }
}

fn alive_by_faction(world: &mut World) -> Vec<(u64, usize)> {
    let mut query = world.query::<(&Actor, &Health)>();
    let mut counts: Vec<(u64, usize)> = Vec::new();
    for (actor, health) in query.iter(world) {
        if !health.is_alive() {
            continue;
        }
        match counts.iter_mut().find(|(faction, _)| *faction == actor.faction_id) {
            Some((_, count)) => *count += 1,
            None => counts.push((actor.faction_id, 1)),
        }
    }
    counts.sort();
    counts
}
