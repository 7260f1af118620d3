//! Внешний мир с точки зрения агента (read-only)
//!
//! Core никогда не мутирует мир: только спрашивает. Поэтому поверхности
//! передаются явно в `update()`/`evaluate()`/`step()` как `&dyn WorldQuery`,
//! без глобального состояния и без блокировок.
//!
//! Необязательные запросы имеют default-реализации: хост может подключить
//! воду, тропы или препятствия позже (частичная доступность мира).

use bevy::prelude::*;

pub mod sandbox;

pub use sandbox::{SandboxTarget, SandboxWorld};

/// Препятствие = вертикальный цилиндр (дерево, камень, куст)
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    /// Центр основания (на земле)
    pub position: Vec3,
    pub radius: f32,
    pub height: f32,
    /// Может служить backdrop-укрытием (кусты, подлесок)
    pub is_cover: bool,
}

impl Obstacle {
    pub fn new(position: Vec3, radius: f32, height: f32) -> Self {
        Self {
            position,
            radius,
            height,
            is_cover: false,
        }
    }

    pub fn cover(position: Vec3, radius: f32, height: f32) -> Self {
        Self {
            position,
            radius,
            height,
            is_cover: true,
        }
    }

    /// Пересекается ли круг тела агента с препятствием (по XZ)
    pub fn overlaps(&self, point: Vec3, body_radius: f32) -> bool {
        crate::math::flat_distance(self.position, point) < self.radius + body_radius
    }
}

/// Запросы к миру
pub trait WorldQuery {
    /// Высота terrain в точке
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        0.0
    }

    fn is_water_at(&self, _x: f32, _z: f32) -> bool {
        false
    }

    /// Препятствия в радиусе от точки (порядок не гарантирован)
    fn nearby_obstacles(&self, _point: Vec3, _radius: f32) -> Vec<Obstacle> {
        Vec::new()
    }

    /// Перекрыт ли луч `from → to` кандидатами
    ///
    /// Засчитываются только попадания строго до цели.
    fn ray_occluded(&self, from: Vec3, to: Vec3, candidates: &[Obstacle]) -> bool {
        const TARGET_EPSILON: f32 = 1e-3;

        candidates.iter().any(|obstacle| {
            crate::math::segment_cylinder_hit(from, to, obstacle.position, obstacle.radius, obstacle.height)
                .is_some_and(|t| t < 1.0 - TARGET_EPSILON)
        })
    }

    fn nearest_water_source(&self, _point: Vec3) -> Option<Vec3> {
        None
    }

    /// Точка на заранее рассчитанной тропе; `roll` ∈ [0, 1) выбирает место
    fn trail_sample(&self, _roll: f32) -> Option<Vec3> {
        None
    }
}

/// Стойка цели (игрока)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
    Prone,
}

/// Сенсор цели (игрок-охотник)
pub trait TargetSensor {
    /// Позиция ног цели
    fn position(&self) -> Vec3;

    fn stance(&self) -> Stance {
        Stance::Standing
    }

    /// Высота глаз над позицией для стойки
    fn eye_height_offset(&self, stance: Stance) -> f32 {
        match stance {
            Stance::Standing => 1.7,
            Stance::Crouching => 1.0,
            Stance::Prone => 0.3,
        }
    }

    /// Громкость шума прямо сейчас (0 = тишина)
    fn noise_level(&self) -> f32 {
        0.0
    }

    /// Дальность слышимости текущего шума (метры)
    fn noise_range(&self) -> f32 {
        0.0
    }

    /// Откуда идёт шум (по умолчанию от самой цели)
    fn noise_source(&self) -> Vec3 {
        self.position()
    }
}
