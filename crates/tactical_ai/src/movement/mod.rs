//! Movement layer — исполнение MovementCommand
//!
//! AI пишет high-level intent (MovementCommand + LookAt), здесь он
//! превращается в destination для NavigationOracle и в шаг Transform.
//!
//! - process_movement_commands: Changed<MovementCommand> → set_destination / stop
//! - execute_movement: FollowEntity refresh, шаг по пути, поворот
//!
//! Arrival решают сами FSM (свой arrival radius), событий тут нет.

use bevy::prelude::*;

use crate::components::{LookAt, MovementCommand, MovementSpeed, NavigationAgent, NavigationState};
use crate::perception::TargetRegistry;
use crate::spatial::NavigationOracle;

/// FollowEntity: пересчитываем путь если цель сместилась дальше (метры)
const FOLLOW_REPATH_DISTANCE: f32 = 0.5;

/// Обработка MovementCommand → Navigator destination
///
/// КРИТИЧНО: set_destination вызывается только при Changed<MovementCommand>.
pub fn process_movement_commands(
    mut query: Query<
        (Entity, &MovementCommand, &Transform, &mut NavigationState),
        (Changed<MovementCommand>, With<NavigationAgent>),
    >,
    navigation: Option<ResMut<NavigationOracle>>,
    registry: Res<TargetRegistry>,
) {
    let Some(mut navigation) = navigation else {
        return;
    };

    for (entity, command, transform, mut nav_state) in query.iter_mut() {
        match command {
            // Idle — destination не трогаем
            MovementCommand::Idle => {}
            MovementCommand::MoveToPosition { target } => {
                nav_state.destination = Some(*target);
                navigation
                    .0
                    .set_destination(entity, transform.translation, *target);
            }
            MovementCommand::FollowEntity { target } => {
                match registry.get(*target) {
                    Some(snapshot) => {
                        nav_state.destination = Some(snapshot.position);
                        navigation
                            .0
                            .set_destination(entity, transform.translation, snapshot.position);
                    }
                    None => {
                        nav_state.destination = None;
                        navigation.0.stop(entity);
                    }
                }
            }
            MovementCommand::Stop => {
                nav_state.reset();
                navigation.0.stop(entity);
            }
        }
    }
}

/// Шаг движения по пути + поворот (LookAt приоритетнее направления ходьбы)
pub fn execute_movement(
    mut query: Query<
        (
            Entity,
            &MovementCommand,
            &MovementSpeed,
            &LookAt,
            &mut Transform,
            &mut NavigationState,
        ),
        With<NavigationAgent>,
    >,
    navigation: Option<ResMut<NavigationOracle>>,
    registry: Res<TargetRegistry>,
    time: Res<Time<Fixed>>,
) {
    let Some(mut navigation) = navigation else {
        return;
    };
    let delta = time.delta_secs();

    for (entity, command, speed, look, mut transform, mut nav_state) in query.iter_mut() {
        // FollowEntity: destination = текущая позиция цели
        if let MovementCommand::FollowEntity { target } = command {
            match registry.live(*target) {
                Some(snapshot) => {
                    let stale = nav_state
                        .destination
                        .is_none_or(|d| d.distance(snapshot.position) > FOLLOW_REPATH_DISTANCE);
                    if stale {
                        nav_state.destination = Some(snapshot.position);
                        navigation
                            .0
                            .set_destination(entity, transform.translation, snapshot.position);
                    }
                }
                None => {
                    if nav_state.destination.is_some() {
                        nav_state.reset();
                        navigation.0.stop(entity);
                    }
                }
            }
        }

        let position = transform.translation;
        let mut walk_direction = Vec3::ZERO;

        if let Some(next) = navigation.0.next_path_point(entity, position) {
            let to_next = Vec3::new(next.x - position.x, 0.0, next.z - position.z);
            let distance = to_next.length();
            let step = speed.speed * delta;

            if distance > f32::EPSILON {
                let moved = if step >= distance {
                    to_next
                } else {
                    to_next / distance * step
                };
                transform.translation += moved;
                walk_direction = to_next / distance;
            }
        }

        // Путь пройден: destination больше не держим (FollowEntity обновляет свой сам)
        if matches!(command, MovementCommand::MoveToPosition { .. })
            && nav_state.destination.is_some()
            && navigation.0.is_path_finished(entity, transform.translation)
        {
            nav_state.reset();
            navigation.0.stop(entity);
        }

        let facing = match look.point {
            Some(point) => Vec3::new(point.x - transform.translation.x, 0.0, point.z - transform.translation.z),
            None => walk_direction,
        };
        if facing.length_squared() > f32::EPSILON {
            transform.look_to(facing.normalize(), Vec3::Y);
        }
    }
}
