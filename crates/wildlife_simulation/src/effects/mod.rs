//! Внешние sinks: анимация и fire-and-forget эффекты
//!
//! Core только *выбирает* анимацию по ключу и сообщает о событиях
//! (кровь, шаги, звуковые cues). Кто и как это рисует/озвучивает, не его дело.

use bevy::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

/// Ключ анимационного клипа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum AnimationKey {
    Idle,
    Walk,
    Trot,
    Run,
    Eat,
    Drink,
    Alert,
    Paw,
    Die,
    Dead,
}

impl AnimationKey {
    pub const ALL: [AnimationKey; 10] = [
        AnimationKey::Idle,
        AnimationKey::Walk,
        AnimationKey::Trot,
        AnimationKey::Run,
        AnimationKey::Eat,
        AnimationKey::Drink,
        AnimationKey::Alert,
        AnimationKey::Paw,
        AnimationKey::Die,
        AnimationKey::Dead,
    ];

    /// Имя клипа в asset'е
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationKey::Idle => "Idle",
            AnimationKey::Walk => "Walk",
            AnimationKey::Trot => "Trot",
            AnimationKey::Run => "Run",
            AnimationKey::Eat => "Eat",
            AnimationKey::Drink => "Drink",
            AnimationKey::Alert => "Alert",
            AnimationKey::Paw => "Paw",
            AnimationKey::Die => "Die",
            AnimationKey::Dead => "Dead",
        }
    }
}

/// Запрос анимации (что хотим проиграть)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationRequest {
    pub key: AnimationKey,
    pub looped: bool,
    pub time_scale: f32,
}

impl AnimationRequest {
    pub fn looped(key: AnimationKey, time_scale: f32) -> Self {
        Self { key, looped: true, time_scale }
    }

    pub fn once(key: AnimationKey) -> Self {
        Self { key, looped: false, time_scale: 1.0 }
    }

    /// Нейтральный fallback для отсутствующих клипов
    pub fn neutral() -> Self {
        Self::looped(AnimationKey::Idle, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimationError {
    #[error("animation clip `{0}` is missing")]
    MissingClip(&'static str),
}

pub trait AnimationSink {
    fn play(&mut self, key: AnimationKey, looped: bool, time_scale: f32) -> Result<(), AnimationError>;
}

/// Fire-and-forget события (не ожидаются core'ом)
pub trait EffectsSink {
    /// Кровь в точке попадания (ровно один раз на ранение)
    fn on_wound(&mut self, point: Vec3);
    fn on_footstep(&mut self, point: Vec3, moving: bool);
    /// "Blow": фырканье при входе в Alert
    fn on_alert_cue(&mut self);
    fn on_flee_cue(&mut self);
}

/// Событие эффекта (для записи/пересылки в ECS)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectCue {
    Wound(Vec3),
    Footstep { point: Vec3, moving: bool },
    Alert,
    Flee,
}

/// Sink, который всё выбрасывает
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEffects;

impl EffectsSink for NullEffects {
    fn on_wound(&mut self, _point: Vec3) {}
    fn on_footstep(&mut self, _point: Vec3, _moving: bool) {}
    fn on_alert_cue(&mut self) {}
    fn on_flee_cue(&mut self) {}
}

/// Sink, который копит события (тесты, ECS bridge)
#[derive(Debug, Default, Clone)]
pub struct RecordingEffects {
    pub cues: Vec<EffectCue>,
}

impl RecordingEffects {
    pub fn count(&self, predicate: impl Fn(&EffectCue) -> bool) -> usize {
        self.cues.iter().filter(|cue| predicate(cue)).count()
    }

    pub fn alert_count(&self) -> usize {
        self.count(|cue| matches!(cue, EffectCue::Alert))
    }

    pub fn flee_count(&self) -> usize {
        self.count(|cue| matches!(cue, EffectCue::Flee))
    }

    pub fn wound_count(&self) -> usize {
        self.count(|cue| matches!(cue, EffectCue::Wound(_)))
    }

    pub fn drain(&mut self) -> Vec<EffectCue> {
        std::mem::take(&mut self.cues)
    }
}

impl EffectsSink for RecordingEffects {
    fn on_wound(&mut self, point: Vec3) {
        self.cues.push(EffectCue::Wound(point));
    }

    fn on_footstep(&mut self, point: Vec3, moving: bool) {
        self.cues.push(EffectCue::Footstep { point, moving });
    }

    fn on_alert_cue(&mut self) {
        self.cues.push(EffectCue::Alert);
    }

    fn on_flee_cue(&mut self) {
        self.cues.push(EffectCue::Flee);
    }
}

/// Animation sink с набором доступных клипов
///
/// `None` = все клипы есть. Проигранные запросы копятся в `played`.
#[derive(Debug, Default, Clone)]
pub struct RecordingAnimations {
    pub available: Option<HashSet<AnimationKey>>,
    pub played: Vec<AnimationRequest>,
}

impl RecordingAnimations {
    pub fn with_clips(clips: impl IntoIterator<Item = AnimationKey>) -> Self {
        Self {
            available: Some(clips.into_iter().collect()),
            played: Vec::new(),
        }
    }

    pub fn last(&self) -> Option<&AnimationRequest> {
        self.played.last()
    }

    pub fn drain(&mut self) -> Vec<AnimationRequest> {
        std::mem::take(&mut self.played)
    }
}

impl AnimationSink for RecordingAnimations {
    fn play(&mut self, key: AnimationKey, looped: bool, time_scale: f32) -> Result<(), AnimationError> {
        if let Some(available) = &self.available {
            if !available.contains(&key) {
                return Err(AnimationError::MissingClip(key.as_str()));
            }
        }
        self.played.push(AnimationRequest { key, looped, time_scale });
        Ok(())
    }
}
