//! Сценарии поверх фасада Agent (без ECS)
//!
//! Охотник подкрадывается, шумит, стреляет; олень пьёт, убегает, умирает.

use bevy::prelude::*;
use wildlife_simulation::{
    Agent, AgentContext, AnimationKey, BehaviorConfig, BehaviorState, EffectCue, FsmOutput, HitZone, Obstacle,
    RecordingAnimations, RecordingEffects, SandboxTarget, SandboxWorld, WorldQuery,
};

const DT: f32 = 0.1;

struct Scenario {
    agent: Agent,
    world: SandboxWorld,
    hunter: SandboxTarget,
    animations: RecordingAnimations,
    effects: RecordingEffects,
}

impl Scenario {
    fn new(config: BehaviorConfig, world: SandboxWorld, hunter: SandboxTarget) -> Self {
        let mut agent = Agent::new(config, 2024);
        agent.spawn(Vec3::ZERO, 0.0);
        Self {
            agent,
            world,
            hunter,
            animations: RecordingAnimations::default(),
            effects: RecordingEffects::default(),
        }
    }

    fn tick(&mut self) -> FsmOutput {
        let mut ctx = AgentContext {
            world: &self.world,
            target: &self.hunter,
            animation: &mut self.animations,
            effects: &mut self.effects,
        };
        self.agent.update(DT, &mut ctx)
    }

    /// Тикаем пока не выполнится условие (bounded)
    fn run_until(&mut self, max_ticks: usize, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..max_ticks {
            self.tick();
            if done(self) {
                return true;
            }
        }
        false
    }

    fn distance_to_hunter(&self) -> f32 {
        let delta = self.agent.pose().position - self.hunter.position;
        Vec2::new(delta.x, delta.z).length()
    }
}

/// Не уходит сам из Idle (чтобы сценарий был про реакцию)
fn patient_deer() -> BehaviorConfig {
    let mut config = BehaviorConfig::deer();
    config.fsm.idle_duration = [100.0, 100.0];
    config
}

#[test]
fn test_stalking_hunter_alerts_once_then_flees() {
    let hunter = SandboxTarget::at(Vec3::new(0.0, 0.0, 50.0));
    let mut s = Scenario::new(patient_deer(), SandboxWorld::new(), hunter);

    // Идёт к оленю 4 m/s
    let mut hunter_z = 50.0;
    let mut fled = false;
    for _ in 0..200 {
        hunter_z -= 0.4;
        s.hunter.move_to(Vec3::new(0.0, 0.0, hunter_z));
        s.tick();
        if s.agent.state() == BehaviorState::Fleeing {
            fled = true;
            break;
        }
    }

    assert!(fled, "deer never fled, state {:?}", s.agent.state());
    assert_eq!(s.effects.alert_count(), 1);
    assert_eq!(s.effects.flee_count(), 1);

    let alert_index = s.effects.cues.iter().position(|cue| *cue == EffectCue::Alert);
    let flee_index = s.effects.cues.iter().position(|cue| *cue == EffectCue::Flee);
    assert!(alert_index < flee_index, "alert cue must precede flee cue");

    // Убегает: дистанция растёт
    let start = s.distance_to_hunter();
    for _ in 0..30 {
        s.tick();
    }
    assert!(s.distance_to_hunter() > start + 10.0);
    assert_eq!(s.agent.state(), BehaviorState::Fleeing);
    assert_eq!(s.animations.last().map(|request| request.key), Some(AnimationKey::Run));
}

#[test]
fn test_still_hunter_in_the_open_is_not_noticed() {
    let hunter = SandboxTarget::at(Vec3::new(0.0, 0.0, 35.0));
    let mut s = Scenario::new(patient_deer(), SandboxWorld::new(), hunter);

    for _ in 0..100 {
        s.tick();
    }

    assert!(s.agent.last_perception().visible);
    assert!(!s.agent.last_perception().movement_confirmed);
    assert_eq!(s.agent.state(), BehaviorState::Idle);
    assert_eq!(s.effects.alert_count(), 0);
}

#[test]
fn test_noise_behind_trees_is_heard() {
    // Стена деревьев между оленем и охотником
    let mut world = SandboxWorld::new();
    for i in -3..=3 {
        world = world.with_obstacle(Obstacle::new(Vec3::new(i as f32 * 1.5, 0.0, 15.0), 0.8, 10.0));
    }
    let hunter = SandboxTarget::at(Vec3::new(0.0, 0.0, 40.0)).with_noise(1.0, 60.0);
    let mut s = Scenario::new(patient_deer(), world, hunter);

    s.tick();

    assert!(!s.agent.last_perception().visible);
    assert!(s.agent.last_perception().heard);
    assert_eq!(s.agent.state(), BehaviorState::Alert);
    assert_eq!(s.effects.alert_count(), 1);
}

#[test]
fn test_thirsty_deer_walks_to_the_shore_and_drinks() {
    let mut config = patient_deer();
    config.fsm.thirst_threshold = 3.0;
    let world = SandboxWorld::new().with_pond(Vec3::new(0.0, 0.0, 20.0), 5.0);
    let hunter = SandboxTarget::at(Vec3::new(500.0, 0.0, 500.0));
    let mut s = Scenario::new(config, world, hunter);

    let saw_thirsty = s.run_until(100, |s| s.agent.state() == BehaviorState::Thirsty);
    assert!(saw_thirsty);
    let shore = s.agent.water_target().expect("pond should give a shore point");
    assert!(!s.world.is_water_at(shore.x, shore.z));

    let drinking = s.run_until(300, |s| s.agent.state() == BehaviorState::Drinking);
    assert!(drinking, "deer never reached water, at {:?}", s.agent.pose().position);

    let position = s.agent.pose().position;
    assert!(!s.world.is_water_at(position.x, position.z));
    assert!(Vec2::new(position.x - shore.x, position.z - shore.z).length() <= 2.0 + 1e-3);
    assert_eq!(s.agent.fsm().time_since_drink(), 0.0);
    assert_eq!(s.animations.last().map(|request| request.key), Some(AnimationKey::Drink));
}

#[test]
fn test_thirst_without_water_falls_back_to_wandering() {
    let mut config = patient_deer();
    config.fsm.thirst_threshold = 1.0;
    let hunter = SandboxTarget::at(Vec3::new(500.0, 0.0, 500.0));
    let mut s = Scenario::new(config, SandboxWorld::new(), hunter);

    let wandering = s.run_until(50, |s| s.agent.state() == BehaviorState::Wandering);

    assert!(wandering);
    assert!(s.agent.water_target().is_none());
    assert!(s.agent.fsm().time_since_drink() < 1.0);
}

#[test]
fn test_flesh_wounds_weaken_until_vital_hit_kills() {
    let hunter = SandboxTarget::at(Vec3::new(500.0, 0.0, 500.0));
    let mut s = Scenario::new(patient_deer(), SandboxWorld::new(), hunter);
    let flank = Vec3::new(0.4, 1.0, 0.0);

    let first = s.agent.apply_wound(HitZone::Gut, flank, &mut s.effects);
    let second = s.agent.apply_wound(HitZone::Gut, flank, &mut s.effects);
    let third = s.agent.apply_wound(HitZone::Leg, flank, &mut s.effects);

    assert!(!first.killed && !second.killed && !third.killed);
    assert_eq!(third.accumulated_severity, 5);
    assert!((third.energy - 0.3).abs() < 1e-5);
    assert_eq!(s.agent.state(), BehaviorState::Wounded);

    let fatal = s.agent.apply_wound(HitZone::Shoulder, flank, &mut s.effects);
    assert!(fatal.killed);
    assert_eq!(s.agent.state(), BehaviorState::Killed);
    assert_eq!(s.effects.wound_count(), 4);
}

#[test]
fn test_killed_is_terminal_until_respawn() {
    let hunter = SandboxTarget::at(Vec3::new(0.0, 0.0, 10.0)).with_noise(1.0, 80.0);
    let world = SandboxWorld::new();
    let mut s = Scenario::new(patient_deer(), world, hunter);

    s.agent.apply_wound(HitZone::Heart, Vec3::new(0.4, 1.0, 0.0), &mut s.effects);
    assert_eq!(s.agent.state(), BehaviorState::Killed);

    let mut fallen = 0;
    for i in 0..60 {
        s.hunter.move_to(Vec3::new(0.0, 0.0, 10.0 - i as f32 * 0.1));
        let output = s.tick();
        assert_eq!(output.state, BehaviorState::Killed);
        if output.cues.fallen {
            fallen += 1;
        }
    }
    assert!(fallen <= 1);
    assert_eq!(s.agent.fsm().fall_events(), 1);
    assert!(!s.agent.request_transition(BehaviorState::Idle));
    assert!(!s.agent.request_transition_by_name("Fleeing"));
    assert_eq!(s.animations.last().map(|request| request.key), Some(AnimationKey::Dead));

    s.agent.respawn(&s.world);
    assert_eq!(s.agent.state(), BehaviorState::Idle);
    assert!(!s.agent.fsm().fallen());
}
