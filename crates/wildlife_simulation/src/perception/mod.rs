//! PerceptionEngine: зрение + слух с кэшем и гистерезисом
//!
//! Зрение дорогое (выборка occluder'ов + raycast + terrain), поэтому
//! считается с cadence, зависящей от состояния оленя, и кэшируется.
//! Слух и подтверждение движения дешёвые: считаются на каждом evaluate.
//!
//! Кэш: явный `Option`: нет кэша → всегда свежий расчёт,
//! никаких "по умолчанию видим".

use bevy::prelude::*;

use crate::ai::BehaviorState;
use crate::config::PerceptionConfig;
use crate::math::{flat, flat_distance};
use crate::world::{Obstacle, Stance, TargetSensor, WorldQuery};

pub mod movement;

pub use movement::MovementTracker;


/// Результат восприятия за тик
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerceptionResult {
    pub visible: bool,
    pub heard: bool,
    /// Цель двигалась устойчиво (≥ окна обнаружения)
    pub movement_confirmed: bool,
    /// Дальность замечания с учётом стойки и backdrop cover
    pub effective_range: f32,
    /// Дистанция до цели по земле
    pub distance: f32,
}

impl PerceptionResult {
    /// Условие обнаружения для state machine
    pub fn detected(&self) -> bool {
        (self.visible && self.movement_confirmed) || self.heard
    }
}

/// Закэшированная видимость
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedVisibility {
    pub visible: bool,
    pub effective_range: f32,
    /// Время расчёта (часы движка)
    pub computed_at: f32,
    /// Где была цель в момент расчёта
    pub target_position: Vec3,
}

#[derive(Debug, Clone)]
pub struct PerceptionEngine {
    config: PerceptionConfig,
    clock: f32,
    cache: Option<CachedVisibility>,
    tracker: MovementTracker,
    fresh_evaluations: u32,
}

impl PerceptionEngine {
    pub fn new(config: PerceptionConfig) -> Self {
        Self {
            config,
            clock: 0.0,
            cache: None,
            tracker: MovementTracker::default(),
            fresh_evaluations: 0,
        }
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// Каждый тик: часы + сэмпл движения цели
    ///
    /// Сэмплы нужны на каждом тике (а не с cadence зрения),
    /// иначе "подряд идущие" теряют смысл.
    pub fn tick(&mut self, dt: f32, target_position: Vec3) {
        if dt.is_finite() && dt > 0.0 {
            self.clock += dt;
        }
        self.tracker.sample(dt, target_position, &self.config);
    }

    /// Cadence пересчёта видимости для состояния вызывающего
    pub fn cadence_for(&self, state: BehaviorState) -> f32 {
        match state {
            BehaviorState::Alert => self.config.cadence_alert,
            BehaviorState::Fleeing | BehaviorState::Wounded => self.config.cadence_fleeing,
            BehaviorState::Grazing | BehaviorState::Drinking => self.config.cadence_stationary,
            _ => self.config.cadence_default,
        }
    }

    pub fn evaluate(
        &mut self,
        self_eye: Vec3,
        target: &dyn TargetSensor,
        world: &dyn WorldQuery,
        caller_state: BehaviorState,
    ) -> PerceptionResult {
        let target_position = target.position();
        let distance = flat_distance(self_eye, target_position);
        let heard = self.hears(self_eye, target);
        let movement_confirmed = self.tracker.is_confirmed();

        // Далеко: даже не смотрим
        if distance > self.config.far_clip {
            self.cache = None;
            return PerceptionResult {
                visible: false,
                heard,
                movement_confirmed,
                effective_range: 0.0,
                distance,
            };
        }

        let cadence = self.cadence_for(caller_state);
        let cached = self.cache.filter(|cache| {
            self.clock - cache.computed_at < cadence
                && flat_distance(cache.target_position, target_position)
                    < self.config.cache_displacement_threshold
        });

        let visibility = match cached {
            Some(cache) => cache,
            None => {
                let (visible, effective_range) = self.compute_visibility(self_eye, target, world, distance);
                let fresh = CachedVisibility {
                    visible,
                    effective_range,
                    computed_at: self.clock,
                    target_position,
                };
                self.cache = Some(fresh);
                self.fresh_evaluations = self.fresh_evaluations.wrapping_add(1);
                fresh
            }
        };

        PerceptionResult {
            visible: visibility.visible,
            heard,
            movement_confirmed,
            effective_range: visibility.effective_range,
            distance,
        }
    }

    fn hears(&self, self_eye: Vec3, target: &dyn TargetSensor) -> bool {
        let level = target.noise_level();
        level > 0.0 && flat_distance(self_eye, target.noise_source()) < target.noise_range()
    }

    fn stance_factor(&self, stance: Stance) -> f32 {
        match stance {
            Stance::Standing => 1.0,
            Stance::Crouching => self.config.crouch_range_factor,
            Stance::Prone => self.config.prone_range_factor,
        }
    }

    /// Свежий расчёт видимости → (visible, effective_range)
    fn compute_visibility(
        &self,
        self_eye: Vec3,
        target: &dyn TargetSensor,
        world: &dyn WorldQuery,
        distance: f32,
    ) -> (bool, f32) {
        let stance = target.stance();
        let nominal_range = self.config.vision_range * self.stance_factor(stance);

        // В упор не спрячешься
        if distance <= self.config.close_range {
            return (true, nominal_range);
        }

        let target_position = target.position();
        let target_eye = target_position + Vec3::Y * target.eye_height_offset(stance);

        let ray_length = self_eye.distance(target_eye);
        let mut candidates = world.nearby_obstacles(self_eye, ray_length + self.config.occluder_margin);
        candidates.sort_by(|a, b| {
            flat_distance(a.position, self_eye).total_cmp(&flat_distance(b.position, self_eye))
        });
        candidates.truncate(self.config.max_occluder_candidates);

        if world.ray_occluded(self_eye, target_eye, &candidates) {
            return (false, nominal_range);
        }

        if self.terrain_blocks(self_eye, target_eye, world) {
            return (false, nominal_range);
        }

        let backdrop = world.nearby_obstacles(target_position, self.config.backdrop_radius);
        let effective_range = if self.has_backdrop_cover(self_eye, target_position, &backdrop) {
            nominal_range / self.config.backdrop_distance_multiplier.max(1.0)
        } else {
            nominal_range
        };

        (distance <= effective_range, effective_range)
    }

    /// Terrain выше луча в любой промежуточной точке → не видно
    fn terrain_blocks(&self, from: Vec3, to: Vec3, world: &dyn WorldQuery) -> bool {
        let samples = self.config.terrain_samples.max(1);
        (1..samples).any(|i| {
            let t = i as f32 / samples as f32;
            let point = from.lerp(to, t);
            world.height_at(point.x, point.z) > point.y
        })
    }

    /// Укрытия кластером позади цели (с точки зрения оленя)
    fn has_backdrop_cover(&self, self_eye: Vec3, target_position: Vec3, nearby: &[Obstacle]) -> bool {
        let view = (flat(target_position) - flat(self_eye)).normalize_or_zero();
        if view == Vec2::ZERO {
            return false;
        }

        let behind = nearby
            .iter()
            .filter(|obstacle| obstacle.is_cover)
            .filter(|obstacle| flat_distance(obstacle.position, target_position) <= self.config.backdrop_radius)
            .filter(|obstacle| {
                let to_cover = (flat(obstacle.position) - flat(target_position)).normalize_or_zero();
                view.dot(to_cover) > self.config.backdrop_dot_threshold
            })
            .count();

        behind >= self.config.backdrop_min_cover
    }

    pub fn cached(&self) -> Option<&CachedVisibility> {
        self.cache.as_ref()
    }

    pub fn movement_confirmed(&self) -> bool {
        self.tracker.is_confirmed()
    }

    /// Сколько раз видимость считалась с нуля (диагностика/тесты)
    pub fn fresh_evaluations(&self) -> u32 {
        self.fresh_evaluations
    }

    /// Полная очистка (respawn)
    pub fn reset(&mut self) {
        self.clock = 0.0;
        self.cache = None;
        self.tracker.reset();
        self.fresh_evaluations = 0;
    }
}
