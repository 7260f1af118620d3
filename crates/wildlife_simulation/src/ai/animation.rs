//! State → animation (чистая функция, без побочных эффектов)

use crate::ai::idle_picker::IdleFlavor;
use crate::ai::BehaviorState;
use crate::effects::{AnimationKey, AnimationRequest};

/// Полоса скорости для выбора клипа локомоции
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeedBand {
    Still,
    Walk,
    Trot,
    Run,
}

impl SpeedBand {
    pub fn from_speed(speed: f32) -> Self {
        if !speed.is_finite() || speed < 0.05 {
            SpeedBand::Still
        } else if speed < 3.0 {
            SpeedBand::Walk
        } else if speed < 6.5 {
            SpeedBand::Trot
        } else {
            SpeedBand::Run
        }
    }

    /// Скорость, под которую сделан клип (m/s)
    fn reference_speed(&self) -> f32 {
        match self {
            SpeedBand::Still => 1.0,
            SpeedBand::Walk => 1.4,
            SpeedBand::Trot => 4.5,
            SpeedBand::Run => 9.0,
        }
    }

    fn key(&self) -> AnimationKey {
        match self {
            SpeedBand::Still => AnimationKey::Idle,
            SpeedBand::Walk => AnimationKey::Walk,
            SpeedBand::Trot => AnimationKey::Trot,
            SpeedBand::Run => AnimationKey::Run,
        }
    }
}

/// Какой клип играть
///
/// `death_clip_duration`: после неё Killed переходит с Die на Dead.
pub fn animation_for(
    state: BehaviorState,
    state_timer: f32,
    is_moving: bool,
    speed: f32,
    flavor: IdleFlavor,
    death_clip_duration: f32,
) -> AnimationRequest {
    let band = SpeedBand::from_speed(speed);
    let locomotion = || {
        let time_scale = (speed / band.reference_speed()).clamp(0.5, 1.5);
        AnimationRequest::looped(band.key(), time_scale)
    };

    match state {
        BehaviorState::Killed if state_timer < death_clip_duration => AnimationRequest::once(AnimationKey::Die),
        BehaviorState::Killed => AnimationRequest::looped(AnimationKey::Dead, 1.0),
        BehaviorState::Alert => AnimationRequest::looped(AnimationKey::Alert, 1.0),
        BehaviorState::Grazing => AnimationRequest::looped(AnimationKey::Eat, 1.0),
        BehaviorState::Drinking => AnimationRequest::looped(AnimationKey::Drink, 1.0),
        BehaviorState::Fleeing if !is_moving || band == SpeedBand::Still => {
            AnimationRequest::looped(AnimationKey::Alert, 1.0)
        }
        BehaviorState::Wounded if !is_moving || band == SpeedBand::Still => AnimationRequest::neutral(),
        BehaviorState::Fleeing | BehaviorState::Wounded => locomotion(),
        BehaviorState::Idle => AnimationRequest::neutral(),
        BehaviorState::Wandering | BehaviorState::Thirsty if is_moving && band != SpeedBand::Still => locomotion(),
        BehaviorState::Wandering | BehaviorState::Thirsty => match flavor {
            IdleFlavor::GrazeLook => AnimationRequest::looped(AnimationKey::Eat, 1.0),
            IdleFlavor::AlertLook => AnimationRequest::looped(AnimationKey::Alert, 1.0),
            IdleFlavor::Neutral => AnimationRequest::neutral(),
            IdleFlavor::Paw => AnimationRequest::once(AnimationKey::Paw),
        },
    }
}
