//! Bevy surface: агенты как компоненты, хост общается событиями
//!
//! Мир и цель: read-only ресурсы. Эффекты и анимации уходят наружу
//! событиями (`AgentEffect`, `AnimationRequested`), хост (движок, тесты)
//! читает их своим EventReader'ом.

use bevy::prelude::*;
use std::collections::HashSet;

use crate::agent::{Agent, AgentContext};
use crate::ai::BehaviorState;
use crate::effects::{AnimationError, AnimationKey, AnimationRequest, AnimationSink, EffectCue, EffectsSink};
use crate::world::{SandboxWorld, Stance, TargetSensor, WorldQuery};
use crate::wounds::HitZone;

/// Выстрел хоста по агенту
#[derive(Event, Debug, Clone)]
pub struct WoundRequest {
    pub entity: Entity,
    pub zone: HitZone,
    pub hit_point: Vec3,
}

/// Reset + поиск безопасной точки
#[derive(Event, Debug, Clone)]
pub struct RespawnRequest {
    pub entity: Entity,
}

/// Эффект агента (кровь, шаг, звуковые cue)
#[derive(Event, Debug, Clone)]
pub struct AgentEffect {
    pub entity: Entity,
    pub cue: EffectCue,
}

/// Хост должен проиграть клип
#[derive(Event, Debug, Clone)]
pub struct AnimationRequested {
    pub entity: Entity,
    pub request: AnimationRequest,
}

#[derive(Event, Debug, Clone)]
pub struct AgentStateChanged {
    pub entity: Entity,
    pub from: BehaviorState,
    pub to: BehaviorState,
}

/// Поверхность мира (terrain, вода, препятствия)
#[derive(Resource)]
pub struct WorldSurface(pub Box<dyn WorldQuery + Send + Sync>);

impl WorldSurface {
    pub fn new(world: impl WorldQuery + Send + Sync + 'static) -> Self {
        Self(Box::new(world))
    }
}

impl Default for WorldSurface {
    fn default() -> Self {
        Self::new(SandboxWorld::new())
    }
}

/// Охотник (цель восприятия), хост обновляет каждый кадр
#[derive(Resource, Debug, Clone)]
pub struct ThreatSource {
    pub position: Vec3,
    pub stance: Stance,
    pub noise_level: f32,
    pub noise_range: f32,
}

impl Default for ThreatSource {
    fn default() -> Self {
        // Далеко за far clip, тихо
        Self {
            position: Vec3::new(10_000.0, 0.0, 10_000.0),
            stance: Stance::Standing,
            noise_level: 0.0,
            noise_range: 0.0,
        }
    }
}

impl TargetSensor for ThreatSource {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn stance(&self) -> Stance {
        self.stance
    }

    fn noise_level(&self) -> f32 {
        self.noise_level
    }

    fn noise_range(&self) -> f32 {
        self.noise_range
    }
}

/// Какие клипы есть у модели (по умолчанию все)
#[derive(Resource, Debug, Clone)]
pub struct AnimationLibrary {
    pub available: HashSet<AnimationKey>,
}

impl AnimationLibrary {
    pub fn with_clips(clips: impl IntoIterator<Item = AnimationKey>) -> Self {
        Self {
            available: clips.into_iter().collect(),
        }
    }
}

impl Default for AnimationLibrary {
    fn default() -> Self {
        Self::with_clips(AnimationKey::ALL)
    }
}

/// Олень в ECS
#[derive(Component, Debug)]
pub struct WildAgent {
    pub agent: Agent,
}

impl WildAgent {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    /// Компонент + Transform на текущей позе
    pub fn bundle(agent: Agent) -> (Self, Transform) {
        let transform = pose_transform(&agent);
        (Self::new(agent), transform)
    }
}

fn pose_transform(agent: &Agent) -> Transform {
    let pose = agent.pose();
    Transform::from_translation(pose.position).with_rotation(Quat::from_rotation_y(pose.yaw))
}

/// EffectsSink поверх EventWriter
struct EffectEvents<'a, 'w> {
    entity: Entity,
    writer: &'a mut EventWriter<'w, AgentEffect>,
}

impl EffectEvents<'_, '_> {
    fn send(&mut self, cue: EffectCue) {
        self.writer.write(AgentEffect {
            entity: self.entity,
            cue,
        });
    }
}

impl EffectsSink for EffectEvents<'_, '_> {
    fn on_wound(&mut self, point: Vec3) {
        self.send(EffectCue::Wound(point));
    }

    fn on_footstep(&mut self, point: Vec3, moving: bool) {
        self.send(EffectCue::Footstep { point, moving });
    }

    fn on_alert_cue(&mut self) {
        self.send(EffectCue::Alert);
    }

    fn on_flee_cue(&mut self) {
        self.send(EffectCue::Flee);
    }
}

/// AnimationSink поверх EventWriter; клипа нет в библиотеке → MissingClip
struct AnimationEvents<'a, 'w> {
    entity: Entity,
    library: &'a AnimationLibrary,
    writer: &'a mut EventWriter<'w, AnimationRequested>,
}

impl AnimationSink for AnimationEvents<'_, '_> {
    fn play(&mut self, key: AnimationKey, looped: bool, time_scale: f32) -> Result<(), AnimationError> {
        if !self.library.available.contains(&key) {
            return Err(AnimationError::MissingClip(key.as_str()));
        }
        self.writer.write(AnimationRequested {
            entity: self.entity,
            request: AnimationRequest { key, looped, time_scale },
        });
        Ok(())
    }
}

/// Wildlife Plugin
///
/// Порядок в FixedUpdate (chain):
/// 1. apply_wound_requests: выстрелы этого тика
/// 2. process_respawn_requests: respawn до тика, чтобы новая поза сразу жила
/// 3. tick_wild_agents: update каждого агента + sync Transform
pub struct WildlifePlugin;

impl Plugin for WildlifePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<WoundRequest>()
            .add_event::<RespawnRequest>()
            .add_event::<AgentEffect>()
            .add_event::<AnimationRequested>()
            .add_event::<AgentStateChanged>()
            .init_resource::<WorldSurface>()
            .init_resource::<ThreatSource>()
            .init_resource::<AnimationLibrary>()
            .add_systems(
                FixedUpdate,
                (apply_wound_requests, process_respawn_requests, tick_wild_agents).chain(),
            );
    }
}

pub fn apply_wound_requests(
    mut requests: EventReader<WoundRequest>,
    mut agents: Query<&mut WildAgent>,
    mut effects: EventWriter<AgentEffect>,
) {
    for request in requests.read() {
        let Ok(mut wild) = agents.get_mut(request.entity) else {
            crate::log_warning(&format!("⚠️ WoundRequest: entity {:?} is not a wild agent", request.entity));
            continue;
        };

        let mut sink = EffectEvents {
            entity: request.entity,
            writer: &mut effects,
        };
        wild.agent.apply_wound(request.zone, request.hit_point, &mut sink);
    }
}

pub fn process_respawn_requests(
    mut requests: EventReader<RespawnRequest>,
    surface: Res<WorldSurface>,
    mut agents: Query<(&mut WildAgent, &mut Transform)>,
) {
    for request in requests.read() {
        let Ok((mut wild, mut transform)) = agents.get_mut(request.entity) else {
            crate::log_warning(&format!("⚠️ RespawnRequest: entity {:?} is not a wild agent", request.entity));
            continue;
        };

        wild.agent.respawn(surface.0.as_ref());
        *transform = pose_transform(&wild.agent);
    }
}

pub fn tick_wild_agents(
    time: Res<Time<Fixed>>,
    surface: Res<WorldSurface>,
    threat: Res<ThreatSource>,
    library: Res<AnimationLibrary>,
    mut agents: Query<(Entity, &mut WildAgent, &mut Transform)>,
    mut effects: EventWriter<AgentEffect>,
    mut animations: EventWriter<AnimationRequested>,
    mut state_changes: EventWriter<AgentStateChanged>,
) {
    let dt = time.delta_secs();

    // Порядок по entity: события выходят в стабильном порядке
    let mut ordered: Vec<_> = agents.iter_mut().collect();
    ordered.sort_by_key(|(entity, _, _)| *entity);

    for (entity, mut wild, mut transform) in ordered {
        let mut effect_sink = EffectEvents {
            entity,
            writer: &mut effects,
        };
        let mut animation_sink = AnimationEvents {
            entity,
            library: &library,
            writer: &mut animations,
        };
        let mut ctx = AgentContext {
            world: surface.0.as_ref(),
            target: &*threat,
            animation: &mut animation_sink,
            effects: &mut effect_sink,
        };

        let output = wild.agent.update(dt, &mut ctx);

        for transition in &output.transitions {
            state_changes.write(AgentStateChanged {
                entity,
                from: transition.from,
                to: transition.to,
            });
        }

        *transform = pose_transform(&wild.agent);
    }
}
