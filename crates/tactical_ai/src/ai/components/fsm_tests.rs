//! Tests for FSM AI components.

use super::*;

#[test]
fn test_agent_state_default() {
    let state = AgentState::default();
    assert!(matches!(state, AgentState::Patrol { destination: None, .. }));
    assert!(!state.is_engaged());
}

#[test]
fn test_agent_config_default() {
    let config = AgentConfig::default();
    assert_eq!(config.pursuit_timeout, 6.0);
    assert_eq!(config.vigilance_duration, 4.0);
    assert!(config.arrival_radius > 0.0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_agent_config_rejects_broken_timers() {
    let config = AgentConfig {
        pursuit_timeout: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { field: "pursuit_timeout", .. })
    ));

    let config = AgentConfig {
        vigilance_duration: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { field: "vigilance_duration", .. })
    ));

    // 0 = без vigilance, это валидно
    let config = AgentConfig {
        vigilance_duration: 0.0,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_route_ping_pong() {
    let route = PatrolRoute::new(vec![Vec3::ZERO, Vec3::X, Vec3::Z], PathMode::PingPong);

    assert_eq!(route.advance(0, true), Some((1, true)));
    assert_eq!(route.advance(1, true), Some((2, true)));
    // Конец маршрута → разворот
    assert_eq!(route.advance(2, true), Some((1, false)));
    assert_eq!(route.advance(1, false), Some((0, false)));
    assert_eq!(route.advance(0, false), Some((1, true)));
}

#[test]
fn test_route_assault_stops_at_end() {
    let route = PatrolRoute::new(vec![Vec3::ZERO, Vec3::X], PathMode::StopAtEnd);
    assert_eq!(route.advance(0, true), Some((1, true)));
    assert_eq!(route.advance(1, true), None);
}

#[test]
fn test_single_point_route_is_finished() {
    let route = PatrolRoute::new(vec![Vec3::X], PathMode::PingPong);
    assert_eq!(route.advance(0, true), None);
}

#[test]
fn test_pursuit_timer_logic() {
    let mut timer = 2.0;
    let delta = 0.5;

    for _ in 0..4 {
        timer -= delta;
    }
    assert_eq!(timer, 0.0);
    assert!(timer <= 0.0); // Pursuit сдаётся
}
