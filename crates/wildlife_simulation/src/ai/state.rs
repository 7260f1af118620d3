//! BehaviorState: состояния оленя

use bevy::prelude::*;

/// Состояние поведения
///
/// Инвариант: из `Killed` выходит только `reset()` (respawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum BehaviorState {
    /// Стоит на месте (после спавна, после Alert)
    #[default]
    Idle,
    /// Бродит между wander targets (с паузами)
    Wandering,
    /// Идёт к водопою
    Thirsty,
    /// Пасётся, стоит на месте
    Grazing,
    /// Пьёт, стоит на месте
    Drinking,
    /// Замер, смотрит на угрозу
    Alert,
    /// Бежит от угрозы
    Fleeing,
    /// Ранен, уходит (слабеет со временем)
    Wounded,
    /// Мёртв: терминальное состояние
    Killed,
}

impl BehaviorState {
    pub const ALL: [BehaviorState; 9] = [
        BehaviorState::Idle,
        BehaviorState::Wandering,
        BehaviorState::Thirsty,
        BehaviorState::Grazing,
        BehaviorState::Drinking,
        BehaviorState::Alert,
        BehaviorState::Fleeing,
        BehaviorState::Wounded,
        BehaviorState::Killed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorState::Idle => "Idle",
            BehaviorState::Wandering => "Wandering",
            BehaviorState::Thirsty => "Thirsty",
            BehaviorState::Grazing => "Grazing",
            BehaviorState::Drinking => "Drinking",
            BehaviorState::Alert => "Alert",
            BehaviorState::Fleeing => "Fleeing",
            BehaviorState::Wounded => "Wounded",
            BehaviorState::Killed => "Killed",
        }
    }

    /// Имя → состояние (регистр не важен); неизвестное имя → None
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Спокойные состояния (угрозы нет)
    pub fn is_calm(&self) -> bool {
        matches!(
            self,
            BehaviorState::Idle
                | BehaviorState::Wandering
                | BehaviorState::Thirsty
                | BehaviorState::Grazing
                | BehaviorState::Drinking
        )
    }

    /// Состояния, где ожидается активное движение (для stuck detection)
    pub fn requires_locomotion(&self) -> bool {
        matches!(
            self,
            BehaviorState::Wandering | BehaviorState::Thirsty | BehaviorState::Fleeing | BehaviorState::Wounded
        )
    }

    /// Состояния, из которых можно захотеть пить
    pub fn is_ambulatory(&self) -> bool {
        matches!(self, BehaviorState::Idle | BehaviorState::Wandering)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BehaviorState::Killed)
    }
}

impl std::fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
