//! Combat behaviour strategies (pluggable per agent).
//!
//! Attack state целиком делегирует сюда: стратегия решает, двигаться или
//! держать позицию, и когда стрелять (cooldown). FSM только применяет
//! `CombatDirective` к movement layer и пишет WeaponFireIntent.

use bevy::prelude::*;

use crate::spatial::ObstacleKind;

/// Что стратегия видит в текущем тике
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatContext {
    pub agent: Entity,
    pub position: Vec3,
    pub target: Entity,
    pub target_position: Vec3,
    /// Видимая точка цели (из LoS cache)
    pub aim_point: Vec3,
    /// Горизонтальная дистанция до цели
    pub distance: f32,
    /// Позиция, назначенная сквадом или поиском
    pub assigned_position: Option<Vec3>,
    pub arrival_radius: f32,
    /// Что стоит на линии огня weapon mount → aim point (None = чисто)
    pub line_of_fire: Option<ObstacleKind>,
}

impl CombatContext {
    pub fn at_assigned_position(&self) -> bool {
        self.assigned_position
            .is_none_or(|p| p.distance(self.position) <= self.arrival_radius)
    }

    pub fn can_fire(&self) -> bool {
        matches!(self.line_of_fire, None | Some(ObstacleKind::Target))
    }
}

/// Движение внутри Attack
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatMovement {
    Hold,
    MoveTo(Vec3),
    Chase,
}

/// Решение стратегии на тик
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatDirective {
    pub movement: CombatMovement,
    pub fire: bool,
    /// Линия огня закрыта — нужна новая позиция
    pub request_reposition: bool,
}

impl CombatDirective {
    pub fn hold() -> Self {
        Self {
            movement: CombatMovement::Hold,
            fire: false,
            request_reposition: false,
        }
    }
}

/// Контракт боевой стратегии
pub trait CombatBehavior: Send + Sync {
    fn enter_combat(&mut self) {}

    fn exit_combat(&mut self) {}

    fn process(&mut self, context: &CombatContext, delta: f32) -> CombatDirective;

    /// Дистанция атаки (метры)
    fn attack_range(&self) -> f32;

    /// Пауза между атаками (секунды)
    fn cooldown(&self) -> f32;
}

/// Component: стратегия, инжектится при конфигурации агента
///
/// Без неё capability combat выключается (агент не входит в Attack).
#[derive(Component)]
pub struct CombatStrategy(pub Box<dyn CombatBehavior>);

impl CombatStrategy {
    pub fn new(behavior: impl CombatBehavior + 'static) -> Self {
        Self(Box::new(behavior))
    }
}

/// Стрелок: держит назначенную/текущую позицию, стреляет по кулдауну пока есть линия огня
#[derive(Debug, Clone)]
pub struct RangedSkirmisher {
    pub range: f32,
    pub fire_cooldown: f32,
    cooldown_timer: f32,
}

impl RangedSkirmisher {
    pub fn new(range: f32, fire_cooldown: f32) -> Self {
        Self {
            range,
            fire_cooldown,
            cooldown_timer: 0.0,
        }
    }
}

impl Default for RangedSkirmisher {
    fn default() -> Self {
        Self::new(25.0, 0.8)
    }
}

impl CombatBehavior for RangedSkirmisher {
    fn enter_combat(&mut self) {
        // Первая очередь не мгновенно (реакция)
        self.cooldown_timer = self.fire_cooldown * 0.5;
    }

    fn process(&mut self, context: &CombatContext, delta: f32) -> CombatDirective {
        self.cooldown_timer = (self.cooldown_timer - delta).max(0.0);

        if let Some(position) = context.assigned_position {
            if !context.at_assigned_position() {
                return CombatDirective {
                    movement: CombatMovement::MoveTo(position),
                    fire: false,
                    request_reposition: false,
                };
            }
        }

        if context.distance > self.range {
            return CombatDirective {
                movement: CombatMovement::Chase,
                fire: false,
                request_reposition: false,
            };
        }

        if !context.can_fire() {
            return CombatDirective {
                movement: CombatMovement::Hold,
                fire: false,
                request_reposition: true,
            };
        }

        let fire = self.cooldown_timer <= 0.0;
        if fire {
            self.cooldown_timer = self.fire_cooldown;
        }

        CombatDirective {
            movement: CombatMovement::Hold,
            fire,
            request_reposition: false,
        }
    }

    fn attack_range(&self) -> f32 {
        self.range
    }

    fn cooldown(&self) -> f32 {
        self.fire_cooldown
    }
}

/// Ближний бой: сближаемся до attack_range, бьём по кулдауну
#[derive(Debug, Clone)]
pub struct MeleeRusher {
    pub range: f32,
    pub strike_cooldown: f32,
    cooldown_timer: f32,
}

impl MeleeRusher {
    pub fn new(range: f32, strike_cooldown: f32) -> Self {
        Self {
            range,
            strike_cooldown,
            cooldown_timer: 0.0,
        }
    }
}

impl Default for MeleeRusher {
    fn default() -> Self {
        Self::new(1.8, 1.2)
    }
}

impl CombatBehavior for MeleeRusher {
    fn exit_combat(&mut self) {
        self.cooldown_timer = 0.0;
    }

    fn process(&mut self, context: &CombatContext, delta: f32) -> CombatDirective {
        self.cooldown_timer = (self.cooldown_timer - delta).max(0.0);

        // Назначенная позиция для melee бесполезна — всегда сближаемся
        if context.distance > self.range {
            return CombatDirective {
                movement: CombatMovement::Chase,
                fire: false,
                request_reposition: false,
            };
        }

        let fire = self.cooldown_timer <= 0.0;
        if fire {
            self.cooldown_timer = self.strike_cooldown;
        }

        CombatDirective {
            movement: CombatMovement::Hold,
            fire,
            request_reposition: false,
        }
    }

    fn attack_range(&self) -> f32 {
        self.range
    }

    fn cooldown(&self) -> f32 {
        self.strike_cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(distance: f32) -> CombatContext {
        CombatContext {
            agent: Entity::from_raw(1),
            position: Vec3::ZERO,
            target: Entity::from_raw(2),
            target_position: Vec3::new(0.0, 0.0, distance),
            aim_point: Vec3::new(0.0, 1.0, distance),
            distance,
            assigned_position: None,
            arrival_radius: 0.5,
            line_of_fire: None,
        }
    }

    #[test]
    fn test_skirmisher_fires_on_cooldown() {
        let mut rifle = RangedSkirmisher::new(20.0, 1.0);
        rifle.enter_combat();
        let ctx = context(10.0);

        // Реакция 0.5 сек
        assert!(!rifle.process(&ctx, 0.25).fire);
        assert!(rifle.process(&ctx, 0.25).fire);
        assert!(!rifle.process(&ctx, 0.5).fire);
        assert!(rifle.process(&ctx, 0.5).fire);
    }

    #[test]
    fn test_skirmisher_moves_to_assigned_then_holds() {
        let mut rifle = RangedSkirmisher::default();
        let mut ctx = context(10.0);
        ctx.assigned_position = Some(Vec3::new(4.0, 0.0, 0.0));

        let directive = rifle.process(&ctx, 0.1);
        assert_eq!(directive.movement, CombatMovement::MoveTo(Vec3::new(4.0, 0.0, 0.0)));
        assert!(!directive.fire);

        ctx.position = Vec3::new(3.8, 0.0, 0.0);
        assert_eq!(rifle.process(&ctx, 0.1).movement, CombatMovement::Hold);
    }

    #[test]
    fn test_skirmisher_blocked_by_ally_requests_reposition() {
        let mut rifle = RangedSkirmisher::default();
        let mut ctx = context(10.0);
        ctx.line_of_fire = Some(ObstacleKind::Ally);

        let directive = rifle.process(&ctx, 1.0);
        assert!(!directive.fire);
        assert!(directive.request_reposition);
    }

    #[test]
    fn test_skirmisher_chases_out_of_range() {
        let mut rifle = RangedSkirmisher::new(10.0, 1.0);
        assert_eq!(rifle.process(&context(15.0), 0.1).movement, CombatMovement::Chase);
    }

    #[test]
    fn test_rusher_closes_distance_then_strikes() {
        let mut blade = MeleeRusher::default();
        assert_eq!(blade.process(&context(6.0), 0.1).movement, CombatMovement::Chase);

        let close = blade.process(&context(1.0), 0.1);
        assert_eq!(close.movement, CombatMovement::Hold);
        assert!(close.fire);
        assert!(!blade.process(&context(1.0), 0.1).fire);
    }
}
