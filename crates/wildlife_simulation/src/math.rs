//! Геометрия на плоскости XZ (Y: вверх)
//!
//! Yaw = 0 смотрит в +Z, положительный yaw поворачивает к +X:
//! forward = (sin yaw, 0, cos yaw).

use bevy::prelude::*;
use std::f32::consts::{PI, TAU};

/// Единичный вектор взгляда для yaw
pub fn forward(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Yaw, который смотрит из `from` в `to` (по XZ)
pub fn yaw_towards(from: Vec3, to: Vec3) -> f32 {
    (to.x - from.x).atan2(to.z - from.z)
}

/// Нормализация угла в (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Поворот к целевому yaw с ограничением скорости
///
/// Внутри `tolerance` снапаемся на цель: без микро-осцилляций.
pub fn rotate_towards(current: f32, target: f32, max_step: f32, tolerance: f32) -> f32 {
    let diff = wrap_angle(target - current);
    if diff.abs() <= tolerance.max(0.0) {
        return wrap_angle(target);
    }
    let step = diff.clamp(-max_step.abs(), max_step.abs());
    wrap_angle(current + step)
}

/// Дистанция по земле (без высоты)
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

pub fn flat(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Пересечение отрезка `from → to` с вертикальным цилиндром
///
/// Цилиндр: основание `base` (центр на земле), радиус, высота.
/// Возвращает параметр t ∈ [0, 1] точки входа, если отрезок реально
/// проходит через объём цилиндра (по XZ и по высоте).
pub fn segment_cylinder_hit(from: Vec3, to: Vec3, base: Vec3, radius: f32, height: f32) -> Option<f32> {
    let d = flat(to) - flat(from);
    let f = flat(from) - flat(base);
    let a = d.dot(d);
    let c = f.dot(f) - radius * radius;

    let (t_enter, t_exit) = if a <= f32::EPSILON {
        // Вертикальный отрезок
        if c > 0.0 {
            return None;
        }
        (0.0, 1.0)
    } else {
        let b = 2.0 * f.dot(d);
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt = disc.sqrt();
        let t0 = (-b - sqrt) / (2.0 * a);
        let t1 = (-b + sqrt) / (2.0 * a);
        if t1 < 0.0 || t0 > 1.0 {
            return None;
        }
        (t0.max(0.0), t1.min(1.0))
    };

    // Высота отрезка на участке внутри цилиндра
    let y_enter = from.y + (to.y - from.y) * t_enter;
    let y_exit = from.y + (to.y - from.y) * t_exit;
    let (low, high) = if y_enter < y_exit { (y_enter, y_exit) } else { (y_exit, y_enter) };

    let top = base.y + height;
    if high < base.y || low > top {
        return None;
    }

    Some(t_enter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_axes() {
        assert!((forward(0.0) - Vec3::Z).length() < 1e-5);
        assert!((forward(PI / 2.0) - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_yaw_towards_matches_forward() {
        let from = Vec3::new(1.0, 0.0, 1.0);
        let to = Vec3::new(4.0, 0.0, -3.0);
        let dir = forward(yaw_towards(from, to));
        let expected = (to - from).normalize();
        assert!((dir - expected).length() < 1e-5);
    }

    #[test]
    fn test_wrap_angle_range() {
        for raw in [-10.0_f32, -PI, 0.0, PI, 7.0, 100.0] {
            let wrapped = wrap_angle(raw);
            assert!(wrapped > -PI - 1e-5 && wrapped <= PI + 1e-5, "{} → {}", raw, wrapped);
        }
    }

    #[test]
    fn test_rotate_towards_rate_limited() {
        let next = rotate_towards(0.0, 1.0, 0.1, 0.01);
        assert!((next - 0.1).abs() < 1e-6);

        // Внутри tolerance: снап на цель
        let snapped = rotate_towards(0.98, 1.0, 0.1, 0.05);
        assert!((snapped - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotate_takes_short_way_around() {
        let next = rotate_towards(3.0, -3.0, 0.1, 0.01);
        // Короткий путь через PI, а не через 0
        assert!(next > 3.0 || next < -3.0);
    }

    #[test]
    fn test_segment_hits_cylinder_in_between() {
        let hit = segment_cylinder_hit(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 10.0),
            Vec3::new(0.0, 0.0, 5.0),
            1.0,
            3.0,
        );
        let t = hit.expect("cylinder is on the segment");
        assert!((t - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_segment_passes_over_low_cylinder() {
        let hit = segment_cylinder_hit(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 10.0),
            Vec3::new(0.0, 0.0, 5.0),
            1.0,
            0.5,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_segment_misses_side_cylinder() {
        let hit = segment_cylinder_hit(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 10.0),
            Vec3::new(3.0, 0.0, 5.0),
            1.0,
            3.0,
        );
        assert!(hit.is_none());
    }
}
