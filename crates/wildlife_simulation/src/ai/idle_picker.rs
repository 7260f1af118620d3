//! Idle flavor: чем олень занят, пока стоит (только анимация)

use bevy::prelude::*;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum IdleFlavor {
    /// Опустил голову к траве
    GrazeLook,
    /// Поднял голову, слушает
    AlertLook,
    #[default]
    Neutral,
    /// Бьёт копытом
    Paw,
}

impl IdleFlavor {
    /// Порядок совпадает с `idle_flavor_weights`
    pub const ALL: [IdleFlavor; 4] = [
        IdleFlavor::GrazeLook,
        IdleFlavor::AlertLook,
        IdleFlavor::Neutral,
        IdleFlavor::Paw,
    ];
}

/// Взвешенный выбор flavor с собственным таймером
#[derive(Debug, Clone, Default)]
pub struct IdlePicker {
    current: IdleFlavor,
    /// До следующего выбора; None → выбрать на ближайшем тике
    remaining: Option<f32>,
}

impl IdlePicker {
    pub fn current(&self) -> IdleFlavor {
        self.current
    }

    pub fn tick(&mut self, dt: f32, interval: [f32; 2], weights: [f32; 4], rng: &mut impl Rng) -> IdleFlavor {
        let remaining = self.remaining.get_or_insert(0.0);
        *remaining -= dt;
        if *remaining <= 0.0 {
            self.current = pick_weighted(weights, rng.gen::<f32>());
            self.remaining = Some(sample_range(interval, rng));
        }
        self.current
    }

    pub fn reset(&mut self) {
        self.current = IdleFlavor::Neutral;
        self.remaining = None;
    }
}

/// `roll` ∈ [0, 1) → flavor по весам (нулевые/битые веса → Neutral)
pub fn pick_weighted(weights: [f32; 4], roll: f32) -> IdleFlavor {
    let total: f32 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total <= 0.0 {
        return IdleFlavor::Neutral;
    }

    let mut threshold = roll.clamp(0.0, 1.0) * total;
    for (flavor, weight) in IdleFlavor::ALL.into_iter().zip(weights) {
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        if threshold < weight {
            return flavor;
        }
        threshold -= weight;
    }

    // roll == 1.0: последний ненулевой
    IdleFlavor::ALL
        .into_iter()
        .zip(weights)
        .rev()
        .find(|(_, weight)| weight.is_finite() && *weight > 0.0)
        .map_or(IdleFlavor::Neutral, |(flavor, _)| flavor)
}

/// Равномерно из [min, max]
pub fn sample_range(range: [f32; 2], rng: &mut impl Rng) -> f32 {
    let [min, max] = range;
    min + rng.gen::<f32>() * (max - min).max(0.0)
}
