//! Position Reservation Table
//!
//! Advisory claims, не locks: ничто не мешает двум агентам независимо
//! посчитать пересекающиеся точки ДО резервации. Проверка separation только
//! не даёт новому агенту выбрать уже занятую точку.
//!
//! Инжектится как Resource (явный service object), ключ — Entity агента.
//! Каждая операция трогает только собственный ключ вызывающего.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::error::OrderError;

#[derive(Resource, Debug, Clone)]
pub struct PositionReservations {
    entries: HashMap<Entity, Vec3>,
    /// Минимальная дистанция между точками разных агентов (метры)
    separation: f32,
}

impl Default for PositionReservations {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl PositionReservations {
    pub fn new(separation: f32) -> Self {
        Self {
            entries: HashMap::new(),
            separation,
        }
    }

    pub fn separation(&self) -> f32 {
        self.separation
    }

    /// ReservePosition: ровно одна запись на агента (новая перезаписывает старую)
    pub fn reserve(&mut self, agent: Entity, point: Vec3) {
        if self.entries.insert(agent, point) != Some(point) {
            crate::logger::log(&format!("📌 Reservation: {:?} → {:?}", agent, point));
        }
    }

    /// ReleasePosition. Возвращает освобождённую точку
    pub fn release(&mut self, agent: Entity) -> Option<Vec3> {
        let released = self.entries.remove(&agent);
        if let Some(point) = released {
            crate::logger::log(&format!("Reservation: {:?} released {:?}", agent, point));
        }
        released
    }

    pub fn reservation_of(&self, agent: Entity) -> Option<Vec3> {
        self.entries.get(&agent).copied()
    }

    pub fn has_reservation(&self, agent: Entity) -> bool {
        self.entries.contains_key(&agent)
    }

    /// IsPositionReserved: точка в пределах separation от резервации ДРУГОГО агента
    pub fn is_reserved(&self, point: Vec3, requester: Entity) -> bool {
        self.is_reserved_by_others(point, &[requester])
    }

    /// То же для группы: резервации самой группы не считаются
    pub fn is_reserved_by_others(&self, point: Vec3, group: &[Entity]) -> bool {
        self.entries
            .iter()
            .any(|(agent, &reserved)| !group.contains(agent) && reserved.distance(point) < self.separation)
    }

    /// RequestPositionsForSquad: резервирует все назначения транзакционно
    ///
    /// Отказ если ЛЮБОЙ участник сквада уже держит резервацию (частичный
    /// re-plan посреди манёвра запрещён). При отказе таблица не меняется.
    pub fn request_positions_for_squad(
        &mut self,
        members: &[Entity],
        assignments: &[(Entity, Vec3)],
    ) -> Result<(), OrderError> {
        if members.iter().any(|member| self.has_reservation(*member)) {
            return Err(OrderError::ReservationConflict);
        }

        for &(agent, point) in assignments {
            self.reserve(agent, point);
        }
        Ok(())
    }

    /// Освободить резервации всех перечисленных агентов
    pub fn release_all(&mut self, agents: &[Entity]) {
        for agent in agents {
            self.release(*agent);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_exclusivity() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let point = Vec3::new(4.0, 0.0, 4.0);
        let mut table = PositionReservations::new(1.5);

        table.reserve(a, point);
        assert!(table.is_reserved(point, b));
        assert!(!table.is_reserved(point, a));
        // Сравнение по радиусу, не по точному совпадению
        assert!(table.is_reserved(point + Vec3::X, b));
        assert!(!table.is_reserved(point + Vec3::X * 2.0, b));

        table.release(a);
        assert!(!table.is_reserved(point, b));
    }

    #[test]
    fn test_one_entry_per_agent() {
        let a = Entity::from_raw(1);
        let mut table = PositionReservations::default();

        table.reserve(a, Vec3::ZERO);
        table.reserve(a, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.reservation_of(a), Some(Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_squad_request_refused_mid_maneuver() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let mut table = PositionReservations::default();
        table.reserve(b, Vec3::ZERO);

        let result = table.request_positions_for_squad(
            &[a, b],
            &[(a, Vec3::X * 5.0), (b, Vec3::X * 10.0)],
        );
        assert_eq!(result, Err(OrderError::ReservationConflict));
        // Таблица не тронута
        assert_eq!(table.reservation_of(a), None);
        assert_eq!(table.reservation_of(b), Some(Vec3::ZERO));

        table.release_all(&[a, b]);
        assert!(table
            .request_positions_for_squad(&[a, b], &[(a, Vec3::X * 5.0), (b, Vec3::X * 10.0)])
            .is_ok());
        assert_eq!(table.len(), 2);
    }
}
