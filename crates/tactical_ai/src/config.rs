//! Designer-facing tuning (process-wide)
//!
//! Все числа тут — параметры дизайнера, не выведенные константы.
//! Загружаются из RON и валидируются один раз при старте сцены.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tactics::{Formation, FormationShape, SearchStrategy};

/// Глобальные параметры тактического ядра
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticalConfig {
    /// LoS cache: запись считается устаревшей если observer или target сдвинулись дальше (метры)
    pub los_invalidation_distance: f32,

    /// Радиус поиска firing position (метры)
    pub search_radius: f32,
    /// Шаг probing-поиска (метры)
    pub search_step: f32,
    /// Probing или Hybrid (контракт одинаковый)
    pub search_strategy: SearchStrategy,

    /// Минимальная дистанция между зарезервированными точками разных агентов (метры)
    pub reservation_separation: f32,

    /// Базовая ценность цели без компонента Targetable
    pub default_base_threat: f32,
    /// Показатель степени дистанции (score ~ 1 / d^weight)
    pub distance_weight: f32,
    /// Множитель для турели с оператором
    pub occupied_turret_multiplier: f32,
    /// Множитель для пустой/автономной турели
    pub turret_multiplier: f32,
    /// Максимальный бонус за раненую цель (0.5 = до +50%)
    pub wounded_bonus: f32,

    /// Firing arc: радиус дуги вокруг цели (метры)
    pub firing_arc_radius: f32,
    /// Firing arc: полный угол раскрытия дуги (радианы)
    pub firing_arc_spread: f32,

    /// Расстояние между слотами формации (метры)
    pub formation_spacing: f32,
    /// Дистанция, на которой формация разворачивается перед целью (метры)
    pub engagement_distance: f32,

    /// Squad Pursuit: сдаёмся через N секунд
    pub squad_pursuit_timeout: f32,
    /// Радиус "дошли до точки" для сквадовых приказов (метры)
    pub squad_arrival_radius: f32,
}

impl Default for TacticalConfig {
    fn default() -> Self {
        Self {
            los_invalidation_distance: 0.25,
            search_radius: 10.0,
            search_step: 1.0,
            search_strategy: SearchStrategy::Hybrid,
            reservation_separation: 1.5,
            default_base_threat: 1.0,
            distance_weight: 1.0,
            occupied_turret_multiplier: 2.0,
            turret_multiplier: 1.5,
            wounded_bonus: 0.5,
            firing_arc_radius: 12.0,
            firing_arc_spread: std::f32::consts::FRAC_PI_2,
            formation_spacing: 2.5,
            engagement_distance: 15.0,
            squad_pursuit_timeout: 8.0,
            squad_arrival_radius: 1.0,
        }
    }
}

impl TacticalConfig {
    /// Загрузить tuning из RON (недостающие поля берутся из Default)
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: TacticalConfig =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("los_invalidation_distance", self.los_invalidation_distance)?;
        positive("search_radius", self.search_radius)?;
        positive("search_step", self.search_step)?;
        positive("reservation_separation", self.reservation_separation)?;
        positive("distance_weight", self.distance_weight)?;
        positive("firing_arc_radius", self.firing_arc_radius)?;
        positive("formation_spacing", self.formation_spacing)?;
        positive("engagement_distance", self.engagement_distance)?;
        positive("squad_pursuit_timeout", self.squad_pursuit_timeout)?;
        positive("squad_arrival_radius", self.squad_arrival_radius)?;

        if self.search_step > self.search_radius {
            return Err(ConfigError::Invalid {
                field: "search_step",
                reason: format!(
                    "step {} exceeds search radius {}",
                    self.search_step, self.search_radius
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.wounded_bonus) {
            return Err(ConfigError::Invalid {
                field: "wounded_bonus",
                reason: format!("{} is outside [0, 1]", self.wounded_bonus),
            });
        }

        if self.occupied_turret_multiplier < self.turret_multiplier || self.turret_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "turret_multiplier",
                reason: "expected occupied >= turret >= 1.0".to_string(),
            });
        }

        Ok(())
    }

    /// Формация сквада по умолчанию (шеренга с настроенным шагом)
    pub fn default_formation(&self) -> Formation {
        Formation::new(FormationShape::Line, self.formation_spacing)
    }
}

pub(crate) fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive, got {}", value),
        })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must not be negative, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TacticalConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = TacticalConfig::from_ron_str("(search_radius: 6.0, search_step: 2.0)")
            .expect("valid ron");

        assert_eq!(config.search_radius, 6.0);
        assert_eq!(config.search_step, 2.0);
        assert_eq!(config.reservation_separation, TacticalConfig::default().reservation_separation);
    }

    #[test]
    fn test_step_larger_than_radius_rejected() {
        let result = TacticalConfig::from_ron_str("(search_radius: 1.0, search_step: 2.0)");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "search_step", .. })
        ));
    }

    #[test]
    fn test_score_and_timing_fields_must_be_positive() {
        for source in [
            "(distance_weight: -1.0)",
            "(engagement_distance: 0.0)",
            "(squad_pursuit_timeout: -2.0)",
        ] {
            assert!(
                matches!(TacticalConfig::from_ron_str(source), Err(ConfigError::Invalid { .. })),
                "accepted {}",
                source
            );
        }

        let result = TacticalConfig::from_ron_str("(distance_weight: -0.5)");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "distance_weight", .. })
        ));
    }

    #[test]
    fn test_default_formation_uses_spacing() {
        let config = TacticalConfig::from_ron_str("(formation_spacing: 4.0)").expect("valid ron");
        assert_eq!(config.default_formation(), Formation::new(FormationShape::Line, 4.0));
    }

    #[test]
    fn test_search_strategy_from_ron() {
        let config = TacticalConfig::from_ron_str("(search_strategy: Probing)").expect("valid ron");
        assert_eq!(config.search_strategy, SearchStrategy::Probing);
        assert_eq!(TacticalConfig::default().search_strategy, SearchStrategy::Hybrid);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = TacticalConfig::from_ron_str("(search_radius: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
