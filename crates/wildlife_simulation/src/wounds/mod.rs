//! WoundModel: классификация попаданий и летальность
//!
//! Ранения копятся монотонно (только `reset()` очищает запись).
//! Смерть: чисто по порогам: суммарная severity ИЛИ число ранений.
//! Никаких флагов "было ли реальное попадание".
//!
//! Модель не держит визуального состояния: кровь: через EffectsSink у фасада.

use bevy::prelude::*;

use crate::config::WoundConfig;
use crate::math::flat;
use crate::navigation::AgentPose;


/// Зона попадания (от hitbox'а модели)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum HitZone {
    Heart,
    Lungs,
    Liver,
    Gut,
    Shoulder,
    Neck,
    Leg,
    Body,
}

impl HitZone {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "heart" | "vitals" => Some(HitZone::Heart),
            "lungs" | "lung" => Some(HitZone::Lungs),
            "liver" => Some(HitZone::Liver),
            "gut" | "stomach" | "paunch" => Some(HitZone::Gut),
            "shoulder" => Some(HitZone::Shoulder),
            "neck" => Some(HitZone::Neck),
            "leg" | "hindquarter" => Some(HitZone::Leg),
            "body" => Some(HitZone::Body),
            _ => None,
        }
    }
}

/// Тип ранения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum WoundType {
    MuscleHit,
    ShoulderShot,
    LiverShot,
    GutShot,
    SingleLung,
    DoubleLung,
    /// Vitals: мгновенно летально
    HeartShot,
}

impl WoundType {
    /// Фиксированный вес ранения
    pub fn severity(&self) -> u32 {
        match self {
            WoundType::MuscleHit => 1,
            WoundType::ShoulderShot => 2,
            WoundType::LiverShot => 2,
            WoundType::GutShot => 2,
            WoundType::SingleLung => 3,
            WoundType::DoubleLung => 5,
            WoundType::HeartShot => 6,
        }
    }

    /// Царапина по мышце (не проникающее)
    pub fn is_flesh_wound(&self) -> bool {
        matches!(self, WoundType::MuscleHit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wound {
    pub wound_type: WoundType,
    pub severity_points: u32,
    pub hit_point: Vec3,
}

/// Итог одного `apply_wound`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WoundOutcome {
    /// Это (или более раннее) ранение летально
    pub killed: bool,
    pub wound_type: WoundType,
    pub accumulated_severity: u32,
    pub wound_count: usize,
    pub energy: f32,
}

/// Сводка для state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WoundStatus {
    pub fatal: bool,
    pub wound_count: usize,
    pub accumulated_severity: u32,
    /// 1.0 = здоров, меньше значит слабеет
    pub energy: f32,
}

impl Default for WoundStatus {
    fn default() -> Self {
        Self {
            fatal: false,
            wound_count: 0,
            accumulated_severity: 0,
            energy: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WoundModel {
    config: WoundConfig,
    record: Vec<Wound>,
}

impl WoundModel {
    pub fn new(config: WoundConfig) -> Self {
        Self {
            config,
            record: Vec::new(),
        }
    }

    /// Классификация по зоне + геометрии попадания относительно морды
    ///
    /// Лёгкие: попадание во фланг (broadside) → DoubleLung,
    /// под углом спереди/сзади (quartering) → SingleLung.
    pub fn classify(zone: HitZone, hit_point: Vec3, pose: &AgentPose) -> WoundType {
        match zone {
            HitZone::Heart => WoundType::HeartShot,
            HitZone::Lungs => {
                if is_broadside(hit_point, pose) {
                    WoundType::DoubleLung
                } else {
                    WoundType::SingleLung
                }
            }
            HitZone::Liver => WoundType::LiverShot,
            HitZone::Gut => WoundType::GutShot,
            HitZone::Shoulder => WoundType::ShoulderShot,
            HitZone::Neck | HitZone::Leg | HitZone::Body => WoundType::MuscleHit,
        }
    }

    pub fn apply_wound(&mut self, zone: HitZone, hit_point: Vec3, pose: &AgentPose) -> WoundOutcome {
        let wound_type = Self::classify(zone, hit_point, pose);
        self.record_wound(wound_type, hit_point)
    }

    /// Добавить уже классифицированное ранение
    pub fn record_wound(&mut self, wound_type: WoundType, hit_point: Vec3) -> WoundOutcome {
        self.record.push(Wound {
            wound_type,
            severity_points: wound_type.severity(),
            hit_point,
        });

        WoundOutcome {
            killed: self.is_fatal(),
            wound_type,
            accumulated_severity: self.accumulated_severity(),
            wound_count: self.wound_count(),
            energy: self.energy(),
        }
    }

    pub fn accumulated_severity(&self) -> u32 {
        self.record.iter().map(|wound| wound.severity_points).sum()
    }

    pub fn wound_count(&self) -> usize {
        self.record.len()
    }

    /// Ранения, которые идут в lethal count
    pub fn lethal_count(&self) -> usize {
        if self.config.count_flesh_wounds {
            return self.record.len();
        }
        self.record
            .iter()
            .filter(|wound| !wound.wound_type.is_flesh_wound())
            .count()
    }

    pub fn is_fatal(&self) -> bool {
        self.accumulated_severity() >= self.config.lethal_severity
            || self.lethal_count() >= self.config.lethal_wound_count as usize
    }

    /// Остаток сил по sub-lethal порогам severity
    pub fn energy(&self) -> f32 {
        let severity = self.accumulated_severity();
        self.config
            .energy_thresholds
            .iter()
            .filter(|(threshold, _)| severity >= *threshold)
            .map(|(_, energy)| *energy)
            .fold(1.0_f32, f32::min)
    }

    pub fn status(&self) -> WoundStatus {
        WoundStatus {
            fatal: self.is_fatal(),
            wound_count: self.wound_count(),
            accumulated_severity: self.accumulated_severity(),
            energy: self.energy(),
        }
    }

    pub fn record(&self) -> &[Wound] {
        &self.record
    }

    pub fn reset(&mut self) {
        self.record.clear();
    }
}

/// Попадание во фланг: направление на точку попадания почти поперёк морды
fn is_broadside(hit_point: Vec3, pose: &AgentPose) -> bool {
    const QUARTERING_COS: f32 = std::f32::consts::FRAC_1_SQRT_2;

    let local = (flat(hit_point) - flat(pose.position)).normalize_or_zero();
    if local == Vec2::ZERO {
        return true;
    }
    let facing = flat(pose.forward());
    local.dot(facing).abs() < QUARTERING_COS
}
