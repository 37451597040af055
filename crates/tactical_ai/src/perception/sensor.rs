//! Target Tracking Sensor + CurrentTarget
//!
//! Сенсор только ДЕТЕКТИРУЕТ: список живых враждебных целей, обновляемый
//! событиями trigger volume (SensorEvent) и периодической чисткой.
//! Выбор цели — отдельный явный вызов `CurrentTarget::force_set` со стороны
//! state machine агента или сквада.

use bevy::prelude::*;

use super::registry::{TargetRegistry, TargetSnapshot};
use crate::ai::events::SensorEvent;
use crate::components::Actor;

/// Component: обнаруженные враждебные цели
#[derive(Component, Debug, Clone)]
pub struct TargetSensor {
    /// Порядок = порядок обнаружения (значим для tie-break в best_target)
    pub detected: Vec<Entity>,
    /// Период чистки (секунды)
    pub prune_interval: f32,
    prune_timer: f32,
}

impl Default for TargetSensor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TargetSensor {
    pub fn new(prune_interval: f32) -> Self {
        Self {
            detected: Vec::new(),
            prune_interval,
            prune_timer: prune_interval,
        }
    }

    /// Добавить цель (дубликаты игнорируются). true если добавлена
    pub fn detect(&mut self, target: Entity) -> bool {
        if self.detected.contains(&target) {
            return false;
        }
        self.detected.push(target);
        true
    }

    /// Убрать цель. true если была в списке
    pub fn lose(&mut self, target: Entity) -> bool {
        let before = self.detected.len();
        self.detected.retain(|&e| e != target);
        before != self.detected.len()
    }

    pub fn contains(&self, target: Entity) -> bool {
        self.detected.contains(&target)
    }

    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    pub fn clear(&mut self) {
        self.detected.clear();
    }

    /// Продвинуть таймер чистки. true если пора чистить
    pub fn tick(&mut self, delta: f32) -> bool {
        self.prune_timer -= delta;
        if self.prune_timer > 0.0 {
            return false;
        }
        self.prune_timer = self.prune_interval;
        true
    }

    /// Выкинуть мёртвые/despawned/союзные цели. Возвращает сколько удалено
    pub fn prune(&mut self, registry: &TargetRegistry, observer_faction: u64) -> usize {
        let before = self.detected.len();
        self.detected
            .retain(|&e| registry.live_hostile(e, observer_faction).is_some());
        before - self.detected.len()
    }
}

/// Component: текущая цель агента
///
/// Инвариант: если Some — указывает на живую entity. Поскольку цель могут
/// убить другие системы между тиками, читать её можно только через `get`,
/// который ре-валидирует liveness.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentTarget {
    target: Option<Entity>,
}

impl CurrentTarget {
    /// Живая цель (None если не задана или уже мертва)
    pub fn get<'a>(&self, registry: &'a TargetRegistry) -> Option<&'a TargetSnapshot> {
        self.target.and_then(|e| registry.live(e))
    }

    /// Сырая ссылка без ре-валидации (только для логов и сравнения)
    pub fn entity(&self) -> Option<Entity> {
        self.target
    }

    /// ForceSetCurrentTarget: отказывает мёртвым, despawned и союзным целям
    pub fn force_set(
        &mut self,
        target: Entity,
        observer_faction: u64,
        registry: &TargetRegistry,
    ) -> bool {
        if registry.live_hostile(target, observer_faction).is_none() {
            return false;
        }
        self.target = Some(target);
        true
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Сбросить цель если она стала невалидной. true если сброшена
    pub fn clear_if_invalid(&mut self, registry: &TargetRegistry) -> bool {
        match self.target {
            Some(target) if !registry.is_live(target) => {
                self.target = None;
                true
            }
            _ => false,
        }
    }
}

/// Система: применить SensorEvent (onTargetDetected / onTargetLost)
///
/// Фильтрация по фракциям и liveness: добавляем только живых врагов.
pub fn handle_sensor_events(
    mut events: EventReader<SensorEvent>,
    mut sensors: Query<(&mut TargetSensor, &Actor)>,
    registry: Res<TargetRegistry>,
) {
    for event in events.read() {
        match *event {
            SensorEvent::TargetDetected { observer, target } => {
                let Ok((mut sensor, actor)) = sensors.get_mut(observer) else {
                    continue;
                };

                let Some(snapshot) = registry.live_hostile(target, actor.faction_id) else {
                    continue;
                };

                if sensor.detect(target) {
                    crate::logger::log(&format!(
                        "👁️ TargetDetected: {:?} spotted enemy {:?} (faction {} vs {})",
                        observer, target, actor.faction_id, snapshot.faction_id
                    ));
                }
            }
            SensorEvent::TargetLost { observer, target } => {
                if let Ok((mut sensor, _)) = sensors.get_mut(observer) {
                    if sensor.lose(target) {
                        crate::logger::log(&format!(
                            "👻 TargetLost: {:?} lost sight of {:?}",
                            observer, target
                        ));
                    }
                }
            }
        }
    }
}

/// Система: периодическая чистка сенсоров + сброс невалидной CurrentTarget
pub fn prune_sensors(
    mut sensors: Query<(Entity, &mut TargetSensor, &mut CurrentTarget, &Actor)>,
    registry: Res<TargetRegistry>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (entity, mut sensor, mut current, actor) in sensors.iter_mut() {
        if !sensor.tick(delta) {
            continue;
        }

        let removed = sensor.prune(&registry, actor.faction_id);
        if removed > 0 {
            crate::logger::log(&format!(
                "Sensor: {:?} removed {} dead/invalid targets",
                entity, removed
            ));
        }

        if current.clear_if_invalid(&registry) {
            crate::logger::log(&format!("Sensor: {:?} current target invalid → cleared", entity));
        }
    }
}
