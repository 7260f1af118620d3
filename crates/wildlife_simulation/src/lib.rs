//! WILDRUN Simulation Core
//!
//! Автономный олень для охотничьей симуляции: FSM поведения,
//! восприятие (зрение + слух), локальная навигация, модель ранений.
//!
//! Core = чистый Rust без глобального состояния (кроме logger'а):
//! мир, цель, анимации и эффекты приходят через трейты.
//! Bevy plugin сверху гоняет агентов в FixedUpdate (60Hz).

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

// Публичные модули
pub mod agent;
pub mod ai;
pub mod config;
pub mod effects;
pub mod logger;
pub mod math;
pub mod navigation;
pub mod perception;
pub mod world;
pub mod wounds;

// Re-export базовых типов для удобства
pub use agent::{
    Agent, AgentContext, AgentEffect, AgentStateChanged, AnimationLibrary, AnimationRequested, RespawnRequest,
    ThreatSource, WildAgent, WildlifePlugin, WorldSurface, WoundRequest,
};
pub use ai::{BehaviorState, BehaviorStateMachine, FsmInputs, FsmOutput, IdleFlavor};
pub use config::{BehaviorConfig, ConfigError, FsmConfig, NavigationConfig, PerceptionConfig, WoundConfig};
pub use effects::{
    AnimationError, AnimationKey, AnimationRequest, AnimationSink, EffectCue, EffectsSink, NullEffects,
    RecordingAnimations, RecordingEffects,
};
pub use navigation::{AgentPose, LocomotionRequest, NavigationPlanner, PoseDelta};
pub use perception::{PerceptionEngine, PerceptionResult};
pub use world::{Obstacle, SandboxTarget, SandboxWorld, Stance, TargetSensor, WorldQuery};
pub use wounds::{HitZone, WoundModel, WoundOutcome, WoundType};

// Re-export logger
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, log_with_level, set_log_level, set_logger,
    set_logger_if_needed, ConsoleLogger, LogLevel, LogPrinter,
};

/// Главный plugin симуляции
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            // Детерминистичный RNG (seed по умолчанию)
            .insert_resource(DeterministicRng::new(42))
            .add_plugins(WildlifePlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
///
/// Из него раздаются seed'ы агентам; дальше у каждого свой ChaCha8.
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}

/// Заспавнить оленя в ECS (seed берётся из `DeterministicRng`)
pub fn spawn_wild_agent(world: &mut World, config: BehaviorConfig, position: Vec3, heading: f32) -> Entity {
    let seed = world
        .get_resource_mut::<DeterministicRng>()
        .map_or(0, |mut rng| rng.next_seed());

    let mut agent = Agent::new(config, seed);
    agent.spawn(position, heading);
    world.spawn(WildAgent::bundle(agent)).id()
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Один fixed тик вручную (без wall clock): для тестов и runner'а
pub fn run_fixed_tick(app: &mut App, dt: f32) {
    let world = app.world_mut();
    world
        .resource_mut::<Time<Fixed>>()
        .advance_by(Duration::from_secs_f32(dt.max(0.0)));
    world.run_schedule(FixedUpdate);
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Сериализуем в байты через Debug (простейший способ)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
