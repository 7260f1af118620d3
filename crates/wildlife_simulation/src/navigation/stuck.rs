//! StuckDetector: "двигаемся, но не продвигаемся"
//!
//! Ring buffer последних позиций (фиксированная ёмкость, сэмплы по времени).
//! Раз в `stuck_check_interval` сравниваем текущую позицию с записанной
//! interval секунд назад. N подряд провалов → emergency escape.

use bevy::prelude::*;
use std::collections::VecDeque;

use crate::config::NavigationConfig;
use crate::math::flat_distance;

/// Допуск на накопленную ошибку f32 часов
const SAMPLE_TIME_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PositionSample {
    time: f32,
    position: Vec3,
}

#[derive(Debug, Clone)]
pub struct StuckDetector {
    history: VecDeque<PositionSample>,
    capacity: usize,
    next_check_at: f32,
    consecutive_stuck_checks: u32,
    emergency_escape_active: bool,
}

impl StuckDetector {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            next_check_at: 0.0,
            consecutive_stuck_checks: 0,
            emergency_escape_active: false,
        }
    }

    /// Записать позицию; вернуть true если пора делать emergency escape
    ///
    /// Сэмплы пишутся по времени, а не по тикам: буфер покрывает
    /// `stuck_check_interval` при любой частоте шага.
    pub fn sample(&mut self, now: f32, position: Vec3, config: &NavigationConfig) -> bool {
        let interval = config.stuck_check_interval;
        if self.history.is_empty() {
            self.next_check_at = now + interval;
        } else if now >= self.next_check_at {
            self.next_check_at = now + interval;
            self.check(now, position, config);
        }

        self.record(now, position, interval);
        self.emergency_escape_active
    }

    /// Минимальный промежуток между сэмплами: capacity штук охватывают interval
    pub fn sample_spacing(&self, interval: f32) -> f32 {
        interval / self.capacity.saturating_sub(1).max(1) as f32
    }

    fn record(&mut self, now: f32, position: Vec3, interval: f32) {
        let spacing = self.sample_spacing(interval);
        let due = self
            .history
            .back()
            .map_or(true, |last| now - last.time >= spacing - SAMPLE_TIME_TOLERANCE);
        if !due {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(PositionSample { time: now, position });
    }

    fn check(&mut self, now: f32, position: Vec3, config: &NavigationConfig) {
        // Самый свежий сэмпл, которому уже ≥ interval секунд
        let reference = self
            .history
            .iter()
            .rev()
            .find(|sample| now - sample.time >= config.stuck_check_interval - SAMPLE_TIME_TOLERANCE);

        let Some(reference) = reference else {
            return;
        };

        if flat_distance(reference.position, position) < config.stuck_distance_threshold {
            self.consecutive_stuck_checks += 1;
            crate::log(&format!(
                "🪨 Stuck check failed ({}/{}) at {:?}",
                self.consecutive_stuck_checks, config.stuck_checks_before_escape, position
            ));
        } else {
            self.consecutive_stuck_checks = 0;
        }

        if self.consecutive_stuck_checks >= config.stuck_checks_before_escape {
            self.emergency_escape_active = true;
        }
    }

    /// Внешний сигнал "застрял" (например, физика хоста упёрлась)
    pub fn report(&mut self, config: &NavigationConfig) {
        self.consecutive_stuck_checks += 1;
        if self.consecutive_stuck_checks >= config.stuck_checks_before_escape {
            self.emergency_escape_active = true;
        }
    }

    pub fn consecutive_stuck_checks(&self) -> u32 {
        self.consecutive_stuck_checks
    }

    pub fn emergency_escape_active(&self) -> bool {
        self.emergency_escape_active
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Успешный escape или состояние без движения
    pub fn clear(&mut self) {
        self.history.clear();
        self.next_check_at = 0.0;
        self.consecutive_stuck_checks = 0;
        self.emergency_escape_active = false;
    }
}
