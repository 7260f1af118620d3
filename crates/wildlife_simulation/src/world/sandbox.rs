//! Sandbox мир для headless runner'а и тестов
//!
//! Плоская земля + холмы-конусы, пруды-диски, препятствия-цилиндры,
//! одна тропа-ломаная. Никаких spatial-индексов: линейный перебор.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Obstacle, Stance, TargetSensor, WorldQuery};
use crate::math::flat_distance;

const FOREST_SEED: u64 = 0x5EED_F0E5;

/// Конусный холм (для проверки terrain occlusion)
#[derive(Debug, Clone, PartialEq)]
pub struct Hill {
    pub center: Vec3,
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pond {
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxWorld {
    pub ground_height: f32,
    pub obstacles: Vec<Obstacle>,
    pub ponds: Vec<Pond>,
    pub hills: Vec<Hill>,
    pub trail: Vec<Vec3>,
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn with_pond(mut self, center: Vec3, radius: f32) -> Self {
        self.ponds.push(Pond { center, radius });
        self
    }

    pub fn with_hill(mut self, center: Vec3, radius: f32, height: f32) -> Self {
        self.hills.push(Hill { center, radius, height });
        self
    }

    pub fn with_trail(mut self, points: Vec<Vec3>) -> Self {
        self.trail = points;
        self
    }

    /// Лес для demo: деревья по сетке с детерминированным разбросом
    pub fn forest(half_extent: f32, spacing: f32) -> Self {
        let mut world = Self::new();
        // Фиксированный seed: один и тот же лес в каждом прогоне
        let mut rng = ChaCha8Rng::seed_from_u64(FOREST_SEED);
        let mut x = -half_extent;
        while x <= half_extent {
            let mut z = -half_extent;
            while z <= half_extent {
                let jitter_x: f32 = rng.gen_range(-0.5..0.5);
                let jitter_z: f32 = rng.gen_range(-0.5..0.5);
                let position = Vec3::new(x + jitter_x * spacing, 0.0, z + jitter_z * spacing);
                let obstacle = if rng.gen_bool(1.0 / 3.0) {
                    Obstacle::cover(position, 1.2, 1.5)
                } else {
                    Obstacle::new(position, 0.5, 12.0)
                };
                world.obstacles.push(obstacle);
                z += spacing;
            }
            x += spacing;
        }
        world
    }
}

impl WorldQuery for SandboxWorld {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        let point = Vec3::new(x, 0.0, z);
        self.hills.iter().fold(self.ground_height, |height, hill| {
            let distance = flat_distance(hill.center, point);
            if distance < hill.radius {
                height + hill.height * (1.0 - distance / hill.radius)
            } else {
                height
            }
        })
    }

    fn is_water_at(&self, x: f32, z: f32) -> bool {
        let point = Vec3::new(x, 0.0, z);
        self.ponds
            .iter()
            .any(|pond| flat_distance(pond.center, point) < pond.radius)
    }

    fn nearby_obstacles(&self, point: Vec3, radius: f32) -> Vec<Obstacle> {
        self.obstacles
            .iter()
            .filter(|obstacle| flat_distance(obstacle.position, point) <= radius + obstacle.radius)
            .cloned()
            .collect()
    }

    fn nearest_water_source(&self, point: Vec3) -> Option<Vec3> {
        self.ponds
            .iter()
            .min_by(|a, b| {
                flat_distance(a.center, point).total_cmp(&flat_distance(b.center, point))
            })
            .map(|pond| pond.center)
    }

    fn trail_sample(&self, roll: f32) -> Option<Vec3> {
        match self.trail.len() {
            0 => None,
            1 => self.trail.first().copied(),
            len => {
                let segments = (len - 1) as f32;
                let scaled = roll.clamp(0.0, 0.999_999) * segments;
                let index = scaled.floor() as usize;
                let local = scaled - index as f32;
                let a = self.trail.get(index)?;
                let b = self.trail.get(index + 1)?;
                Some(a.lerp(*b, local))
            }
        }
    }
}

/// Сценарная цель: позиция/стойка/шум задаются тестом
#[derive(Debug, Clone, Default)]
pub struct SandboxTarget {
    pub position: Vec3,
    pub stance: Stance,
    pub noise_level: f32,
    pub noise_range: f32,
}

impl SandboxTarget {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    pub fn with_noise(mut self, level: f32, range: f32) -> Self {
        self.noise_level = level;
        self.noise_range = range;
        self
    }

    pub fn move_to(&mut self, position: Vec3) {
        self.position = position;
    }
}

impl TargetSensor for SandboxTarget {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn stance(&self) -> Stance {
        self.stance
    }

    fn noise_level(&self) -> f32 {
        self.noise_level
    }

    fn noise_range(&self) -> f32 {
        self.noise_range
    }
}
