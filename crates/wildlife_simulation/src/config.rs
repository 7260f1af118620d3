//! Параметры поведения агента (статически типизированные)
//!
//! Один `BehaviorConfig` на агента вместо species-подклассов:
//! скорости, пороги восприятия, геометрия навигации, пороги ранений.
//! `Default` = профиль оленя. Загрузка из JSON: для headless runner'а.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Ошибки загрузки/валидации конфига
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Полный конфиг агента
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BehaviorConfig {
    pub fsm: FsmConfig,
    pub perception: PerceptionConfig,
    pub navigation: NavigationConfig,
    pub wounds: WoundConfig,
}

impl BehaviorConfig {
    /// Профиль оленя (то же самое что Default, для читаемости call-site)
    pub fn deer() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Проверка инвариантов, которые serde не выразит
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be > 0, got {}", value),
                })
            }
        }

        fn probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be in [0, 1], got {}", value),
                })
            }
        }

        positive("fsm.walk_speed", self.fsm.walk_speed)?;
        positive("fsm.flee_speed", self.fsm.flee_speed)?;
        positive("fsm.alert_commit_delay", self.fsm.alert_commit_delay)?;
        probability("fsm.grazing_chance", self.fsm.grazing_chance)?;
        if self.fsm.flee_distance >= self.fsm.alert_distance {
            return Err(ConfigError::Invalid {
                field: "fsm.flee_distance",
                reason: format!(
                    "must be below alert_distance ({} >= {})",
                    self.fsm.flee_distance, self.fsm.alert_distance
                ),
            });
        }

        positive("perception.far_clip", self.perception.far_clip)?;
        positive("perception.vision_range", self.perception.vision_range)?;
        if self.perception.max_occluder_candidates == 0 {
            return Err(ConfigError::Invalid {
                field: "perception.max_occluder_candidates",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.perception.confirm_min_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "perception.confirm_min_samples",
                reason: "must be at least 1".to_string(),
            });
        }

        positive("navigation.world_half_extent", self.navigation.world_half_extent)?;
        positive("navigation.turn_rate", self.navigation.turn_rate)?;
        positive("navigation.avoidance_step_degrees", self.navigation.avoidance_step_degrees)?;
        probability("navigation.trail_probability", self.navigation.trail_probability)?;
        if self.navigation.safety_margin >= self.navigation.world_half_extent {
            return Err(ConfigError::Invalid {
                field: "navigation.safety_margin",
                reason: "leaves no playable area".to_string(),
            });
        }
        positive("navigation.stuck_check_interval", self.navigation.stuck_check_interval)?;
        // Один сэмпл не может быть одновременно "сейчас" и "interval назад"
        if self.navigation.stuck_history_capacity < 2 {
            return Err(ConfigError::Invalid {
                field: "navigation.stuck_history_capacity",
                reason: format!(
                    "must be at least 2 to span stuck_check_interval, got {}",
                    self.navigation.stuck_history_capacity
                ),
            });
        }

        if self.wounds.lethal_severity == 0 || self.wounds.lethal_wound_count == 0 {
            return Err(ConfigError::Invalid {
                field: "wounds",
                reason: "lethal thresholds must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

/// State machine: дистанции реакции, скорости, таймеры
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsmConfig {
    /// Скорость шага (m/s)
    pub walk_speed: f32,
    /// Скорость бегства (m/s), масштабируется energy
    pub flee_speed: f32,
    /// Скорость раненого (m/s), масштабируется energy
    pub wounded_speed: f32,
    /// Скорость к водопою (m/s)
    pub thirsty_speed: f32,

    /// Ближе этого при обнаружении → Fleeing (метры)
    pub flee_distance: f32,
    /// Ближе этого (но дальше flee_distance) → Alert (метры)
    pub alert_distance: f32,
    /// Минимум в Alert перед возвратом в Idle; обновляется при каждом обнаружении
    pub alert_commit_delay: f32,
    /// После входа в Alert: окно, в котором олень замирает и не срывается в бег
    pub alert_movement_delay: f32,

    /// Минимальная длительность бегства (секунды)
    pub min_flee_duration: f32,
    /// Длительность Wounded до возврата в Wandering (секунды)
    pub wounded_duration: f32,

    /// Шанс уйти в Grazing на развилке Idle/Wandering
    pub grazing_chance: f32,
    pub idle_duration: [f32; 2],
    pub graze_duration: [f32; 2],
    pub drink_duration: f32,
    /// Пауза на месте после достижения wander target
    pub wander_pause: [f32; 2],

    /// Секунды без воды до Thirsty
    pub thirst_threshold: f32,
    /// Радиус прибытия к точке водопоя (метры)
    pub drink_arrival_radius: f32,

    /// Интервал idle-flavor picker'а
    pub idle_flavor_interval: [f32; 2],
    /// Веса: graze-look, alert-look, neutral, paw
    pub idle_flavor_weights: [f32; 4],

    /// Длина клипа Die; после него mapping отдаёт Dead
    pub death_clip_duration: f32,
    /// Длина шага для footstep событий (метры)
    pub stride_length: f32,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.4,
            flee_speed: 9.0,
            wounded_speed: 5.5,
            thirsty_speed: 1.8,
            flee_distance: 25.0,
            alert_distance: 55.0,
            alert_commit_delay: 2.5,
            alert_movement_delay: 0.6,
            min_flee_duration: 6.0,
            wounded_duration: 14.0,
            grazing_chance: 0.5,
            idle_duration: [2.0, 5.0],
            graze_duration: [6.0, 14.0],
            drink_duration: 8.0,
            wander_pause: [1.0, 4.0],
            thirst_threshold: 180.0,
            drink_arrival_radius: 2.0,
            idle_flavor_interval: [2.5, 6.0],
            idle_flavor_weights: [0.35, 0.2, 0.35, 0.1],
            death_clip_duration: 1.6,
            stride_length: 1.1,
        }
    }
}

/// Восприятие: зрение + слух + подтверждение движения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Высота глаз оленя над позицией (метры)
    pub eye_height: f32,
    /// Дальше: даже не пытаемся (raycast не делаем)
    pub far_clip: f32,
    /// Номинальная дальность замечания стоящей цели (метры)
    pub vision_range: f32,
    /// Ближе: видим всегда
    pub close_range: f32,

    /// Cadence пересчёта по состоянию (секунды)
    pub cadence_alert: f32,
    pub cadence_fleeing: f32,
    pub cadence_stationary: f32,
    pub cadence_default: f32,
    /// Смещение цели, сбрасывающее cache (метры)
    pub cache_displacement_threshold: f32,

    /// Запас к длине луча при выборке occluder'ов
    pub occluder_margin: f32,
    pub max_occluder_candidates: usize,
    /// Сколько точек terrain проверять вдоль луча
    pub terrain_samples: usize,

    /// Backdrop cover: радиус вокруг цели
    pub backdrop_radius: f32,
    /// Порог dot(observer→target, target→cover)
    pub backdrop_dot_threshold: f32,
    /// Сколько укрытий сзади считается "кластером"
    pub backdrop_min_cover: usize,
    /// Во сколько раз укрытие сзади "удаляет" цель
    pub backdrop_distance_multiplier: f32,

    /// Множители дальности по стойке цели
    pub crouch_range_factor: f32,
    pub prone_range_factor: f32,

    /// Подтверждение движения: минимум подряд идущих сэмплов
    pub confirm_min_samples: u32,
    /// ... и минимум суммарного времени движения (секунды)
    pub confirm_min_duration: f32,
    /// Скорость цели, которая считается движением (m/s)
    pub confirm_min_speed: f32,
    /// Смещение за один сэмпл, которое считается телепортом (метры)
    pub teleport_distance: f32,
    /// Сколько держим подтверждение после остановки цели
    pub confirm_decay: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            eye_height: 1.4,
            far_clip: 150.0,
            vision_range: 90.0,
            close_range: 4.0,
            cadence_alert: 0.15,
            cadence_fleeing: 0.3,
            cadence_stationary: 0.75,
            cadence_default: 0.5,
            cache_displacement_threshold: 1.5,
            occluder_margin: 2.0,
            max_occluder_candidates: 24,
            terrain_samples: 8,
            backdrop_radius: 5.0,
            backdrop_dot_threshold: 0.5,
            backdrop_min_cover: 2,
            backdrop_distance_multiplier: 2.0,
            crouch_range_factor: 0.6,
            prone_range_factor: 0.35,
            confirm_min_samples: 6,
            confirm_min_duration: 0.4,
            confirm_min_speed: 0.35,
            teleport_distance: 6.0,
            confirm_decay: 1.0,
        }
    }
}

/// Навигация: wander targets, avoidance, stuck recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Центр игровой области (x, z)
    pub world_center: [f32; 2],
    /// Половина стороны квадрата игровой области (метры)
    pub world_half_extent: f32,
    /// Отступ от края для новых целей
    pub safety_margin: f32,

    pub wander_radius: [f32; 2],
    pub wander_attempts: u32,
    pub trail_probability: f32,
    pub arrival_radius: f32,

    /// Радиус тела для проверки препятствий
    pub agent_radius: f32,

    pub avoidance_step_degrees: f32,
    pub avoidance_look_ahead: f32,
    pub commit_window: f32,
    pub escalated_commit_window: f32,
    /// Окно учёта столкновений (секунды)
    pub collision_window: f32,
    /// Сколько столкновений в окне → escalated commit
    pub collision_escalation_count: usize,

    /// Максимальная скорость поворота (rad/s)
    pub turn_rate: f32,
    /// "Достаточно близко" по углу (rad)
    pub angle_tolerance: f32,

    pub stuck_check_interval: f32,
    pub stuck_distance_threshold: f32,
    pub stuck_checks_before_escape: u32,
    pub stuck_history_capacity: usize,
    pub escape_test_distance: f32,
    pub center_step: f32,

    /// Длина одного отрезка бегства (метры)
    pub flee_leg_length: f32,
    /// Бюджет пути бегства здорового оленя (метры), масштабируется energy
    pub flee_travel_budget: f32,
    pub flee_target_attempts: u32,

    pub spawn_attempts: u32,
    pub respawn_radius: f32,
    /// Шаг отступа от воды при поиске точки водопоя
    pub shore_search_step: f32,
    pub shore_search_attempts: u32,
}

impl NavigationConfig {
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.world_center[0], 0.0, self.world_center[1])
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            world_center: [0.0, 0.0],
            world_half_extent: 400.0,
            safety_margin: 25.0,
            wander_radius: [10.0, 40.0],
            wander_attempts: 12,
            trail_probability: 0.15,
            arrival_radius: 1.5,
            agent_radius: 0.6,
            avoidance_step_degrees: 30.0,
            avoidance_look_ahead: 3.0,
            commit_window: 0.6,
            escalated_commit_window: 2.0,
            collision_window: 2.0,
            collision_escalation_count: 3,
            turn_rate: 3.0,
            angle_tolerance: 0.05,
            stuck_check_interval: 0.75,
            stuck_distance_threshold: 0.2,
            stuck_checks_before_escape: 3,
            stuck_history_capacity: 60,
            escape_test_distance: 4.0,
            center_step: 1.5,
            flee_leg_length: 40.0,
            flee_travel_budget: 320.0,
            flee_target_attempts: 8,
            spawn_attempts: 24,
            respawn_radius: 80.0,
            shore_search_step: 1.0,
            shore_search_attempts: 16,
        }
    }
}

/// Пороги ранений
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WoundConfig {
    /// Суммарная severity ≥ этого → Killed
    pub lethal_severity: u32,
    /// Засчитанных ранений ≥ этого → Killed
    pub lethal_wound_count: u32,
    /// Засчитывать ли MuscleHit (царапины) в lethal count
    ///
    /// false: Gut, Gut, Muscle оставляет оленя раненым, а три царапины
    /// подряд не убивают вовсе (только severity). true: убивает третье
    /// попадание любой тяжести, в том числе Gut, Gut, Muscle.
    pub count_flesh_wounds: bool,
    /// (порог severity, energy) по возрастанию порога
    pub energy_thresholds: [(u32, f32); 2],
}

impl Default for WoundConfig {
    fn default() -> Self {
        Self {
            lethal_severity: 6,
            lethal_wound_count: 3,
            count_flesh_wounds: false,
            energy_thresholds: [(3, 0.6), (5, 0.3)],
        }
    }
}
