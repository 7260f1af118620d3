//! Подтверждение движения цели (debounce + затухание)
//!
//! `movement_confirmed` включается только после устойчивого смещения:
//! минимум N подряд "движущихся" сэмплов И минимум T секунд движения.
//! Один большой скачок (телепорт, respawn игрока) обнуляет серию.
//! После остановки цели подтверждение держится `confirm_decay` секунд.

use bevy::prelude::*;

use crate::config::PerceptionConfig;
use crate::math::flat_distance;

#[derive(Debug, Clone, Default)]
pub struct MovementTracker {
    last_position: Option<Vec3>,
    /// Подряд идущие сэмплы движения (при остановке убывает по одному)
    streak: u32,
    /// Накопленное время движения в текущей серии
    moving_time: f32,
    confirmed: bool,
    /// Сколько ещё держим подтверждение без движения
    hold: f32,
}

impl MovementTracker {
    pub fn sample(&mut self, dt: f32, position: Vec3, config: &PerceptionConfig) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }

        let Some(last) = self.last_position.replace(position) else {
            return;
        };

        let displacement = flat_distance(last, position);

        if displacement > config.teleport_distance {
            // Скачок: это не движение, серию начинаем заново
            self.streak = 0;
            self.moving_time = 0.0;
            self.decay(dt);
            return;
        }

        let speed = displacement / dt;
        if speed >= config.confirm_min_speed {
            self.streak = self.streak.saturating_add(1);
            self.moving_time += dt;

            if self.confirmed
                || (self.streak >= config.confirm_min_samples
                    && self.moving_time >= config.confirm_min_duration)
            {
                self.confirmed = true;
                self.hold = config.confirm_decay;
            }
        } else {
            self.streak = self.streak.saturating_sub(1);
            self.moving_time = (self.moving_time - dt).max(0.0);
            self.decay(dt);
        }
    }

    fn decay(&mut self, dt: f32) {
        if !self.confirmed {
            return;
        }
        self.hold -= dt;
        if self.hold <= 0.0 {
            self.confirmed = false;
            self.hold = 0.0;
            self.streak = 0;
            self.moving_time = 0.0;
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
