//! Agent: фасад над FSM, восприятием, навигацией и ранами
//!
//! Один `Agent` = один олень. Владеет позой, RNG и всеми подсистемами;
//! мир/цель/анимации/эффекты приходят извне через `AgentContext` на каждый тик.
//!
//! Порядок тика: perception → FSM → navigation → footsteps → animation.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ai::{BehaviorState, BehaviorStateMachine, FsmInputs, FsmOutput};
use crate::config::BehaviorConfig;
use crate::effects::{AnimationRequest, AnimationSink, EffectsSink};
use crate::navigation::{AgentPose, NavigationPlanner, PoseDelta, StrideCounter};
use crate::perception::{PerceptionEngine, PerceptionResult};
use crate::world::{TargetSensor, WorldQuery};
use crate::wounds::{HitZone, WoundModel, WoundOutcome};

pub mod plugin;

pub use plugin::{
    AgentEffect, AgentStateChanged, AnimationLibrary, AnimationRequested, RespawnRequest, ThreatSource,
    WildAgent, WildlifePlugin, WorldSurface, WoundRequest,
};


/// Штраф best-effort кандидата при respawn
const WATER_PENALTY: u32 = 2;
const OBSTACLE_PENALTY: u32 = 1;

/// На сколько метров "за выстрел" ставим угрозу, если стрелок неизвестен
const UNKNOWN_SHOOTER_DISTANCE: f32 = 10.0;

/// Внешние поверхности на один тик
pub struct AgentContext<'a> {
    pub world: &'a dyn WorldQuery,
    pub target: &'a dyn TargetSensor,
    pub animation: &'a mut dyn AnimationSink,
    pub effects: &'a mut dyn EffectsSink,
}

#[derive(Debug, Clone)]
pub struct Agent {
    config: BehaviorConfig,
    seed: u64,
    /// Номер жизни: каждый respawn берёт свой поток ChaCha
    life: u64,
    rng: ChaCha8Rng,
    pose: AgentPose,
    spawn_point: Vec3,
    fsm: BehaviorStateMachine,
    perception: PerceptionEngine,
    navigation: NavigationPlanner,
    wounds: WoundModel,
    stride: StrideCounter,
    last_requested: Option<AnimationRequest>,
    last_animation: Option<AnimationRequest>,
    last_perception: PerceptionResult,
    last_delta: PoseDelta,
    water_target: Option<Vec3>,
    last_target_position: Option<Vec3>,
}

impl Agent {
    pub fn new(config: BehaviorConfig, seed: u64) -> Self {
        Self {
            fsm: BehaviorStateMachine::new(config.fsm.clone()),
            perception: PerceptionEngine::new(config.perception.clone()),
            navigation: NavigationPlanner::new(config.navigation.clone()),
            wounds: WoundModel::new(config.wounds.clone()),
            rng: life_rng(seed, 0),
            seed,
            life: 0,
            pose: AgentPose::default(),
            spawn_point: Vec3::ZERO,
            stride: StrideCounter::default(),
            last_requested: None,
            last_animation: None,
            last_perception: PerceptionResult::default(),
            last_delta: PoseDelta::default(),
            water_target: None,
            last_target_position: None,
            config,
        }
    }

    /// Первичное размещение: полный reset + поза
    pub fn spawn(&mut self, position: Vec3, heading: f32) {
        self.life = 0;
        self.reset();
        self.spawn_point = position;
        self.pose = AgentPose::new(position, heading);
        crate::log(&format!("🦌 Spawned at {:?} heading {:.2}", position, heading));
    }

    /// Reset + поиск безопасной точки рядом со spawn point
    ///
    /// Попыток не больше `spawn_attempts`; если ни одна не прошла,
    /// берётся кандидат с наименьшим штрафом (вода хуже препятствия).
    pub fn respawn(&mut self, world: &dyn WorldQuery) -> Vec3 {
        self.life = self.life.wrapping_add(1);
        self.reset();

        let radius = self.config.navigation.respawn_radius;
        let attempts = self.config.navigation.spawn_attempts.max(1);
        let mut best: Option<(u32, Vec3)> = None;

        for _ in 0..attempts {
            let angle = self.rng.gen::<f32>() * std::f32::consts::TAU;
            let distance = self.rng.gen::<f32>() * radius;
            let offset = Vec3::new(angle.sin(), 0.0, angle.cos()) * distance;
            let mut candidate = self.navigation.clamp_inner(self.spawn_point + offset);
            candidate.y = world.height_at(candidate.x, candidate.z);

            if self.navigation.is_walkable(candidate, world) {
                self.place_after_respawn(candidate);
                return candidate;
            }

            let penalty = self.placement_penalty(candidate, world);
            if best.map_or(true, |(best_penalty, _)| penalty < best_penalty) {
                best = Some((penalty, candidate));
            }
        }

        let fallback = best.map_or(self.spawn_point, |(_, candidate)| candidate);
        crate::log_warning(&format!(
            "⚠️ Respawn: no safe spot in {} attempts, using best candidate {:?}",
            attempts, fallback
        ));
        self.place_after_respawn(fallback);
        fallback
    }

    fn place_after_respawn(&mut self, position: Vec3) {
        let heading = self.rng.gen::<f32>() * std::f32::consts::TAU - std::f32::consts::PI;
        self.pose = AgentPose::new(position, heading);
        crate::log(&format!("🦌 Respawned at {:?} (life {})", position, self.life));
    }

    fn placement_penalty(&self, point: Vec3, world: &dyn WorldQuery) -> u32 {
        let mut penalty = 0;
        if world.is_water_at(point.x, point.z) {
            penalty += WATER_PENALTY;
        }
        let body = self.config.navigation.agent_radius;
        if world
            .nearby_obstacles(point, body)
            .iter()
            .any(|obstacle| obstacle.overlaps(point, body))
        {
            penalty += OBSTACLE_PENALTY;
        }
        penalty
    }

    /// Ранение извне (выстрел хоста)
    ///
    /// Каждое попадание записывается и даёт ровно один `on_wound`.
    /// Убитый олень остаётся Killed, живой → Killed или Wounded.
    pub fn apply_wound(&mut self, zone: HitZone, hit_point: Vec3, effects: &mut dyn EffectsSink) -> WoundOutcome {
        let outcome = self.wounds.apply_wound(zone, hit_point, &self.pose);
        effects.on_wound(hit_point);

        crate::log(&format!(
            "🩸 Wound {:?} ({:?}) severity {} count {} energy {:.1}",
            zone, outcome.wound_type, outcome.accumulated_severity, outcome.wound_count, outcome.energy
        ));

        if self.fsm.state().is_terminal() {
            return outcome;
        }

        if outcome.killed {
            self.fsm.enter_killed();
            self.pose.velocity = 0.0;
            return outcome;
        }

        let threat = self.last_target_position.unwrap_or_else(|| {
            // Стрелок неизвестен: угроза со стороны попадания
            let away = (hit_point - self.pose.position).with_y(0.0).normalize_or_zero();
            self.pose.position + away * UNKNOWN_SHOOTER_DISTANCE
        });
        self.fsm.enter_wounded(Some(threat));
        self.navigation.begin_flight(outcome.energy);
        outcome
    }

    /// Один тик
    pub fn update(&mut self, dt: f32, ctx: &mut AgentContext<'_>) -> FsmOutput {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let state = self.fsm.state();

        let target_position = ctx.target.position();
        self.last_target_position = Some(target_position);
        self.perception.tick(dt, target_position);

        let perception = if state.is_terminal() {
            PerceptionResult::default()
        } else {
            let eye = self.pose.position + Vec3::Y * self.config.perception.eye_height;
            self.perception.evaluate(eye, ctx.target, ctx.world, state)
        };
        self.last_perception = perception;

        if self.fsm.wants_water() {
            if self.water_target.is_none() {
                self.water_target = self.navigation.water_approach_point(self.pose.position, ctx.world);
            }
        } else {
            self.water_target = None;
        }

        let wound_status = self.wounds.status();
        let inputs = FsmInputs {
            perception,
            threat_position: target_position,
            position: self.pose.position,
            is_moving: self.pose.is_moving(),
            arrived: self.last_delta.arrived,
            fatal: wound_status.fatal,
            energy: wound_status.energy,
            water_target: self.water_target,
            flee_budget_exhausted: self.navigation.flee_budget_exhausted(),
        };
        let output = self.fsm.advance(dt, &inputs, &mut self.rng);

        if output.state == BehaviorState::Fleeing
            && output.transitions.iter().any(|transition| transition.to == BehaviorState::Fleeing)
        {
            self.navigation.begin_flight(wound_status.energy);
        }

        if output.cues.alert {
            ctx.effects.on_alert_cue();
        }
        if output.cues.flee {
            ctx.effects.on_flee_cue();
        }
        if output.cues.fallen {
            crate::log("💀 Deer fell");
        }

        self.last_delta = if output.state.is_terminal() {
            self.pose.velocity = 0.0;
            PoseDelta::default()
        } else {
            self.navigation.step(
                dt,
                &mut self.pose,
                output.locomotion,
                output.desired_speed,
                ctx.world,
                &mut self.rng,
            )
        };

        if self.last_delta.distance > 0.0
            && self.stride.advance(self.last_delta.distance, self.config.fsm.stride_length)
        {
            ctx.effects.on_footstep(self.pose.position, self.pose.is_moving());
        }

        self.publish_animation(output.animation, ctx.animation);
        output
    }

    /// Анимация только при смене запроса; нет клипа → нейтральный Idle
    ///
    /// `last_requested` гасит повторы запроса, `last_animation` хранит
    /// то, что реально играет (после fallback это neutral).
    fn publish_animation(&mut self, request: AnimationRequest, sink: &mut dyn AnimationSink) {
        if self.last_requested == Some(request) {
            return;
        }
        self.last_requested = Some(request);
        if self.last_animation == Some(request) {
            return;
        }

        let played = match sink.play(request.key, request.looped, request.time_scale) {
            Ok(()) => Some(request),
            Err(error) => {
                let neutral = AnimationRequest::neutral();
                if self.last_animation == Some(neutral) {
                    crate::log_warning(&format!("⚠️ Animation: {}, neutral idle keeps playing", error));
                    Some(neutral)
                } else {
                    crate::log_warning(&format!("⚠️ Animation: {} → neutral idle", error));
                    match sink.play(neutral.key, neutral.looped, neutral.time_scale) {
                        Ok(()) => Some(neutral),
                        Err(error) => {
                            crate::log_error(&format!("❌ Animation: neutral idle unavailable too: {}", error));
                            None
                        }
                    }
                }
            }
        };
        self.last_animation = played;
    }

    /// Хост сообщает, что физика не пускает агента
    pub fn report_stuck(&mut self) {
        self.navigation.report_stuck();
    }

    pub fn request_transition(&mut self, state: BehaviorState) -> bool {
        self.fsm.request_transition(state)
    }

    pub fn request_transition_by_name(&mut self, name: &str) -> bool {
        self.fsm.request_transition_by_name(name)
    }

    /// Полный reset: раны, кэши, таймеры; RNG с начала потока текущей жизни
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.perception.reset();
        self.navigation.reset();
        self.wounds.reset();
        self.stride.reset();
        self.rng = life_rng(self.seed, self.life);
        self.pose.velocity = 0.0;
        self.last_requested = None;
        self.last_animation = None;
        self.last_perception = PerceptionResult::default();
        self.last_delta = PoseDelta::default();
        self.water_target = None;
        self.last_target_position = None;
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Сколько раз агент возрождался с момента spawn
    pub fn life(&self) -> u64 {
        self.life
    }

    pub fn state(&self) -> BehaviorState {
        self.fsm.state()
    }

    pub fn is_killed(&self) -> bool {
        self.fsm.state() == BehaviorState::Killed
    }

    pub fn pose(&self) -> &AgentPose {
        &self.pose
    }

    pub fn spawn_point(&self) -> Vec3 {
        self.spawn_point
    }

    pub fn fsm(&self) -> &BehaviorStateMachine {
        &self.fsm
    }

    pub fn perception(&self) -> &PerceptionEngine {
        &self.perception
    }

    pub fn navigation(&self) -> &NavigationPlanner {
        &self.navigation
    }

    pub fn wounds(&self) -> &WoundModel {
        &self.wounds
    }

    pub fn last_perception(&self) -> &PerceptionResult {
        &self.last_perception
    }

    pub fn last_delta(&self) -> &PoseDelta {
        &self.last_delta
    }

    pub fn last_animation(&self) -> Option<&AnimationRequest> {
        self.last_animation.as_ref()
    }

    pub fn water_target(&self) -> Option<Vec3> {
        self.water_target
    }
}

/// Один seed на агента, отдельный поток на каждую жизнь
fn life_rng(seed: u64, life: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(life);
    rng
}
