//! BehaviorStateMachine: единственная FSM оленя
//!
//! Порядок проверок (первое совпадение выигрывает):
//! 1. Killed: липкое, никаких guard'ов
//! 2. Смертельные раны → Killed
//! 3. Обнаружение ближе flee_distance → Fleeing (кроме окна замирания в Alert)
//! 4. Обнаружение ближе alert_distance из спокойного состояния → Alert
//! 5. Alert → Idle только когда угрозы нет и hold истёк
//! 6. Спокойная жизнь: Idle/Wandering/Grazing/Thirsty/Drinking по таймерам
//!
//! FSM ничего не двигает и ничего не проигрывает: отдаёт `FsmOutput`,
//! а агент раздаёт его навигации, анимации и эффектам.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::animation::animation_for;
use crate::ai::idle_picker::{sample_range, IdleFlavor, IdlePicker};
use crate::ai::BehaviorState;
use crate::config::FsmConfig;
use crate::effects::AnimationRequest;
use crate::math::flat_distance;
use crate::navigation::LocomotionRequest;
use crate::perception::PerceptionResult;

/// Что FSM знает о мире на этом тике
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsmInputs {
    pub perception: PerceptionResult,
    /// Где угроза (игрок) сейчас
    pub threat_position: Vec3,
    /// Где олень сейчас
    pub position: Vec3,
    pub is_moving: bool,
    /// Навигация дошла до target на прошлом шаге
    pub arrived: bool,
    /// WoundModel считает раны смертельными
    pub fatal: bool,
    /// 1.0 здоров, меньше значит ранен
    pub energy: f32,
    /// Точка подхода к воде (None: воды нет)
    pub water_target: Option<Vec3>,
    pub flee_budget_exhausted: bool,
}

impl Default for FsmInputs {
    fn default() -> Self {
        Self {
            perception: PerceptionResult::default(),
            threat_position: Vec3::ZERO,
            position: Vec3::ZERO,
            is_moving: false,
            arrived: false,
            fatal: false,
            energy: 1.0,
            water_target: None,
            flee_budget_exhausted: false,
        }
    }
}

/// One-shot сигналы за тик
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsmCues {
    pub alert: bool,
    pub flee: bool,
    /// Олень упал (ровно один раз за жизнь)
    pub fallen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: BehaviorState,
    pub to: BehaviorState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsmOutput {
    pub state: BehaviorState,
    pub desired_speed: f32,
    pub animation: AnimationRequest,
    pub locomotion: LocomotionRequest,
    pub cues: FsmCues,
    /// Все переходы с прошлого advance, по порядку
    pub transitions: Vec<StateTransition>,
}

#[derive(Debug, Clone)]
pub struct BehaviorStateMachine {
    config: FsmConfig,
    state: BehaviorState,
    state_timer: f32,
    time_since_drink: f32,
    /// Alert cue уже был (сбрасывается в спокойном состоянии)
    has_alerted_target: bool,
    /// Сколько ещё держать Alert без обнаружения
    alert_hold: f32,
    /// Таймер Idle/Grazing (выбирается при первом тике в состоянии)
    stationary_remaining: Option<f32>,
    /// Пауза в Wandering после прибытия
    wander_pause: Option<f32>,
    idle: IdlePicker,
    last_threat: Option<Vec3>,
    fallen: bool,
    fall_events: u32,
    pending_cues: FsmCues,
    pending_transitions: Vec<StateTransition>,
}

impl BehaviorStateMachine {
    pub fn new(config: FsmConfig) -> Self {
        Self {
            config,
            state: BehaviorState::Idle,
            state_timer: 0.0,
            time_since_drink: 0.0,
            has_alerted_target: false,
            alert_hold: 0.0,
            stationary_remaining: None,
            wander_pause: None,
            idle: IdlePicker::default(),
            last_threat: None,
            fallen: false,
            fall_events: 0,
            pending_cues: FsmCues::default(),
            pending_transitions: Vec::new(),
        }
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn state_timer(&self) -> f32 {
        self.state_timer
    }

    pub fn time_since_drink(&self) -> f32 {
        self.time_since_drink
    }

    pub fn has_alerted_target(&self) -> bool {
        self.has_alerted_target
    }

    pub fn alert_hold(&self) -> f32 {
        self.alert_hold
    }

    pub fn last_threat(&self) -> Option<Vec3> {
        self.last_threat
    }

    pub fn idle_flavor(&self) -> IdleFlavor {
        self.idle.current()
    }

    pub fn is_wander_paused(&self) -> bool {
        self.wander_pause.is_some()
    }

    pub fn fallen(&self) -> bool {
        self.fallen
    }

    /// Сколько раз олень падал (за жизнь должно быть ≤ 1)
    pub fn fall_events(&self) -> u32 {
        self.fall_events
    }

    /// Пора ли искать воду (для агента: считать approach point заранее)
    pub fn wants_water(&self) -> bool {
        self.state == BehaviorState::Thirsty
            || (self.state.is_ambulatory() && self.time_since_drink > self.config.thirst_threshold)
    }

    /// Один тик FSM
    pub fn advance(&mut self, dt: f32, inputs: &FsmInputs, rng: &mut impl Rng) -> FsmOutput {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

        // 1. Killed липкое
        if self.state.is_terminal() {
            self.state_timer += dt;
            return self.output(inputs);
        }

        // 2. Lethality guard (страховка: apply_wound обычно убивает сразу)
        if inputs.fatal {
            self.enter_killed();
            return self.output(inputs);
        }

        self.state_timer += dt;
        if self.state != BehaviorState::Drinking {
            self.time_since_drink += dt;
        }
        self.alert_hold = (self.alert_hold - dt).max(0.0);

        let detected = inputs.perception.detected();
        if detected {
            self.last_threat = Some(inputs.threat_position);
        }

        let next = self.decide(dt, inputs, detected, rng);
        if next != self.state {
            self.transition_to(next);
        }

        // Flavor только пока стоим в Wandering/Thirsty
        if !inputs.is_moving && matches!(self.state, BehaviorState::Wandering | BehaviorState::Thirsty) {
            let interval = self.config.idle_flavor_interval;
            let weights = self.config.idle_flavor_weights;
            self.idle.tick(dt, interval, weights, rng);
        }

        self.output(inputs)
    }

    fn decide(&mut self, dt: f32, inputs: &FsmInputs, detected: bool, rng: &mut impl Rng) -> BehaviorState {
        let distance = inputs.perception.distance;
        let threat_close = detected && distance < self.config.flee_distance;
        let threat_near = detected && distance < self.config.alert_distance;

        match self.state {
            BehaviorState::Killed => BehaviorState::Killed,

            // Уже бежит; обнаружение только обновило last_threat
            BehaviorState::Wounded => {
                if self.state_timer >= self.config.wounded_duration {
                    BehaviorState::Wandering
                } else {
                    BehaviorState::Wounded
                }
            }

            BehaviorState::Fleeing => {
                if inputs.flee_budget_exhausted {
                    crate::log("🫁 Flee budget exhausted → Alert");
                    BehaviorState::Alert
                } else if self.state_timer >= self.config.min_flee_duration && !threat_close {
                    if threat_near {
                        BehaviorState::Alert
                    } else {
                        BehaviorState::Wandering
                    }
                } else {
                    BehaviorState::Fleeing
                }
            }

            BehaviorState::Alert => {
                if detected {
                    self.alert_hold = self.config.alert_commit_delay;
                }
                let frozen = self.state_timer < self.config.alert_movement_delay;
                if threat_close && !frozen {
                    BehaviorState::Fleeing
                } else if !detected && self.alert_hold <= 0.0 {
                    BehaviorState::Idle
                } else {
                    BehaviorState::Alert
                }
            }

            _ if threat_close => BehaviorState::Fleeing,
            _ if threat_near => BehaviorState::Alert,
            _ => self.decide_calm(dt, inputs, rng),
        }
    }

    fn decide_calm(&mut self, dt: f32, inputs: &FsmInputs, rng: &mut impl Rng) -> BehaviorState {
        let thirsty = self.time_since_drink > self.config.thirst_threshold;

        match self.state {
            BehaviorState::Idle => {
                if thirsty {
                    return BehaviorState::Thirsty;
                }
                let range = self.config.idle_duration;
                let remaining = self.stationary_remaining.get_or_insert_with(|| sample_range(range, rng));
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.graze_or_wander(rng)
                } else {
                    BehaviorState::Idle
                }
            }

            BehaviorState::Wandering => {
                if thirsty {
                    return BehaviorState::Thirsty;
                }
                if let Some(pause) = self.wander_pause.as_mut() {
                    *pause -= dt;
                    if *pause <= 0.0 {
                        self.wander_pause = None;
                    }
                    return BehaviorState::Wandering;
                }
                if inputs.arrived {
                    if rng.gen::<f32>() < self.config.grazing_chance {
                        return BehaviorState::Grazing;
                    }
                    self.wander_pause = Some(sample_range(self.config.wander_pause, rng));
                }
                BehaviorState::Wandering
            }

            BehaviorState::Thirsty => match inputs.water_target {
                None => {
                    crate::log_warning("⚠️ Thirsty: no water source reachable, back to Wandering");
                    self.time_since_drink = self.config.thirst_threshold * 0.5;
                    BehaviorState::Wandering
                }
                Some(water) if flat_distance(inputs.position, water) <= self.config.drink_arrival_radius => {
                    BehaviorState::Drinking
                }
                Some(_) => BehaviorState::Thirsty,
            },

            BehaviorState::Grazing => {
                let range = self.config.graze_duration;
                let remaining = self.stationary_remaining.get_or_insert_with(|| sample_range(range, rng));
                *remaining -= dt;
                if *remaining <= 0.0 {
                    BehaviorState::Wandering
                } else {
                    BehaviorState::Grazing
                }
            }

            BehaviorState::Drinking => {
                self.time_since_drink = 0.0;
                if self.state_timer >= self.config.drink_duration {
                    BehaviorState::Wandering
                } else {
                    BehaviorState::Drinking
                }
            }

            other => other,
        }
    }

    fn graze_or_wander(&self, rng: &mut impl Rng) -> BehaviorState {
        if rng.gen::<f32>() < self.config.grazing_chance {
            BehaviorState::Grazing
        } else {
            BehaviorState::Wandering
        }
    }

    fn transition_to(&mut self, next: BehaviorState) {
        let from = self.state;
        self.state = next;
        self.state_timer = 0.0;
        self.stationary_remaining = None;
        self.wander_pause = None;
        self.idle.reset();

        match next {
            BehaviorState::Alert => {
                self.alert_hold = self.config.alert_commit_delay;
                if !self.has_alerted_target {
                    self.has_alerted_target = true;
                    self.pending_cues.alert = true;
                }
            }
            BehaviorState::Fleeing => self.pending_cues.flee = true,
            BehaviorState::Drinking => self.time_since_drink = 0.0,
            BehaviorState::Killed => {
                if !self.fallen {
                    self.fallen = true;
                    self.fall_events += 1;
                    self.pending_cues.fallen = true;
                }
            }
            _ => {}
        }

        if next.is_calm() {
            self.has_alerted_target = false;
        }

        self.pending_transitions.push(StateTransition { from, to: next });
        crate::log(&format!("🦌 {} → {}", from, next));
    }

    /// Смерть: one-way, повторный вызов ничего не делает
    pub fn enter_killed(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.transition_to(BehaviorState::Killed);
        true
    }

    /// Несмертельная рана: Wounded (повторная рана перезапускает таймер)
    pub fn enter_wounded(&mut self, threat: Option<Vec3>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if let Some(threat) = threat {
            self.last_threat = Some(threat);
        }
        if self.state == BehaviorState::Wounded {
            self.state_timer = 0.0;
        } else {
            self.transition_to(BehaviorState::Wounded);
        }
        true
    }

    /// Явный переход снаружи (debug/скрипты)
    ///
    /// Отказ: выход из Killed и прямой вход в Killed (смерть только через раны).
    pub fn request_transition(&mut self, target: BehaviorState) -> bool {
        if self.state.is_terminal() || target.is_terminal() {
            crate::log_warning(&format!(
                "⚠️ Rejected transition {} → {} (terminal)",
                self.state, target
            ));
            return false;
        }
        if target != self.state {
            self.transition_to(target);
        }
        true
    }

    pub fn request_transition_by_name(&mut self, name: &str) -> bool {
        match BehaviorState::from_name(name) {
            Some(target) => self.request_transition(target),
            None => {
                crate::log_warning(&format!("⚠️ Rejected transition to unknown state '{}'", name));
                false
            }
        }
    }

    fn desired_speed(&self, inputs: &FsmInputs) -> f32 {
        let energy = inputs.energy.clamp(0.0, 1.0);
        match self.state {
            BehaviorState::Wandering if self.wander_pause.is_none() => self.config.walk_speed,
            BehaviorState::Thirsty if inputs.water_target.is_some() => self.config.thirsty_speed,
            BehaviorState::Fleeing => self.config.flee_speed * energy,
            BehaviorState::Wounded => self.config.wounded_speed * energy,
            _ => 0.0,
        }
    }

    fn locomotion(&self, inputs: &FsmInputs) -> LocomotionRequest {
        match self.state {
            BehaviorState::Alert => self.last_threat.map_or(LocomotionRequest::Hold, LocomotionRequest::Face),
            BehaviorState::Wandering if self.wander_pause.is_none() => LocomotionRequest::Wander,
            BehaviorState::Thirsty => inputs.water_target.map_or(LocomotionRequest::Hold, LocomotionRequest::MoveTo),
            BehaviorState::Fleeing | BehaviorState::Wounded => {
                self.last_threat.map_or(LocomotionRequest::Wander, LocomotionRequest::FleeFrom)
            }
            _ => LocomotionRequest::Hold,
        }
    }

    fn output(&mut self, inputs: &FsmInputs) -> FsmOutput {
        let desired_speed = self.desired_speed(inputs);
        let animation = animation_for(
            self.state,
            self.state_timer,
            inputs.is_moving,
            desired_speed,
            self.idle.current(),
            self.config.death_clip_duration,
        );

        FsmOutput {
            state: self.state,
            desired_speed,
            animation,
            locomotion: self.locomotion(inputs),
            cues: std::mem::take(&mut self.pending_cues),
            transitions: std::mem::take(&mut self.pending_transitions),
        }
    }

    /// Полный сброс (respawn)
    ///
    /// Возврат в Idle тоже переход: уйдёт в следующем `FsmOutput`.
    pub fn reset(&mut self) {
        let from = self.state;
        *self = Self::new(self.config.clone());
        if from != BehaviorState::Idle {
            self.pending_transitions.push(StateTransition {
                from,
                to: BehaviorState::Idle,
            });
            crate::log(&format!("🦌 {} → {} (reset)", from, BehaviorState::Idle));
        }
    }
}
