//! NavigationPlanner: куда идти и как не застрять
//!
//! Локальная навигация без navmesh:
//! - wander targets (случайный угол/радиус, bounded попытки, тропа)
//! - шаг вперёд с полным откатом при коллизии
//! - avoidance: перебор курсов с шагом, commitment window, эскалация
//! - границы мира: рулим к центру, новый target внутри safety margin
//! - stuck detection (ring buffer) → emergency escape
//!
//! Мир только читается (`&dyn WorldQuery`), поза мутирует только здесь.

use bevy::prelude::*;
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::mem::{discriminant, Discriminant};

use crate::config::NavigationConfig;
use crate::math::{flat, flat_distance, forward, rotate_towards, wrap_angle, yaw_towards};
use crate::world::WorldQuery;

pub mod pose;
pub mod stuck;

pub use pose::AgentPose;
pub use stuck::StuckDetector;


/// Максимум запомненных коллизий (окно всё равно режет по времени)
const COLLISION_HISTORY_CAP: usize = 16;

/// Шаг сэмплинга воды вдоль look-ahead отрезка
const PATH_SAMPLE_SPACING: f32 = 0.5;
const MAX_PATH_SAMPLES: usize = 32;

/// Что state machine хочет от ног
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocomotionRequest {
    /// Стоять (Idle, Grazing, Drinking, пауза в Wandering, Killed)
    #[default]
    Hold,
    /// Стоять и поворачиваться к точке (Alert)
    Face(Vec3),
    /// Идти к wander target (новый при прибытии)
    Wander,
    /// Уходить от угрозы легами по `flee_leg_length`
    FleeFrom(Vec3),
    /// Идти к конкретной точке (подход к воде)
    MoveTo(Vec3),
}

/// Зафиксированный курс обхода
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceCommit {
    pub heading: f32,
    /// Сколько ещё держать курс (сек)
    pub remaining: f32,
}

/// Текущее намерение навигации
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NavigationIntent {
    pub target: Option<Vec3>,
    pub speed: f32,
    pub avoidance: Option<AvoidanceCommit>,
}

/// Что произошло за шаг
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseDelta {
    pub translation: Vec3,
    pub yaw_change: f32,
    /// Пройдено по земле (м)
    pub distance: f32,
    /// Ход отменён (препятствие/вода/граница)
    pub collided: bool,
    /// В пределах arrival_radius от target
    pub arrived: bool,
    pub emergency_escape: bool,
    pub out_of_bounds: bool,
    /// Flee budget кончился: ноги больше не несут
    pub budget_exhausted: bool,
}

/// Счётчик шагов для footstep-эффектов
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrideCounter {
    accumulated: f32,
}

impl StrideCounter {
    /// Добавить пройденное; true если пора ставить след
    pub fn advance(&mut self, distance: f32, stride_length: f32) -> bool {
        if stride_length <= 0.0 || !distance.is_finite() || distance <= 0.0 {
            return false;
        }
        self.accumulated += distance;
        if self.accumulated >= stride_length {
            self.accumulated %= stride_length;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct NavigationPlanner {
    config: NavigationConfig,
    intent: NavigationIntent,
    clock: f32,
    /// Время недавних коллизий (для эскалации commitment window)
    collisions: VecDeque<f32>,
    stuck: StuckDetector,
    flee_budget: f32,
    last_mode: Option<Discriminant<LocomotionRequest>>,
    /// Был ли агент за границей на прошлом шаге (ловим момент выхода)
    was_out_of_bounds: bool,
    emergency_escapes: u32,
}

impl NavigationPlanner {
    pub fn new(config: NavigationConfig) -> Self {
        let stuck = StuckDetector::new(config.stuck_history_capacity);
        let flee_budget = config.flee_travel_budget;
        Self {
            config,
            intent: NavigationIntent::default(),
            clock: 0.0,
            collisions: VecDeque::with_capacity(COLLISION_HISTORY_CAP),
            stuck,
            flee_budget,
            last_mode: None,
            was_out_of_bounds: false,
            emergency_escapes: 0,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn intent(&self) -> &NavigationIntent {
        &self.intent
    }

    pub fn stuck_detector(&self) -> &StuckDetector {
        &self.stuck
    }

    pub fn emergency_escapes(&self) -> u32 {
        self.emergency_escapes
    }

    /// Один шаг навигации
    pub fn step(
        &mut self,
        dt: f32,
        pose: &mut AgentPose,
        request: LocomotionRequest,
        speed: f32,
        world: &dyn WorldQuery,
        rng: &mut impl Rng,
    ) -> PoseDelta {
        let mut delta = PoseDelta::default();
        if !dt.is_finite() || dt <= 0.0 {
            return delta;
        }
        self.clock += dt;

        let start_position = pose.position;
        let start_yaw = pose.yaw;

        self.tick_avoidance(dt);
        self.prune_collisions();

        // Сменился режим: старый target/обход больше не актуальны
        let mode = discriminant(&request);
        if self.last_mode != Some(mode) {
            self.intent.target = None;
            self.intent.avoidance = None;
            self.stuck.clear();
            self.last_mode = Some(mode);
        }

        let out_of_bounds = !self.in_bounds(pose.position);
        delta.out_of_bounds = out_of_bounds;
        // Только что вытолкнули наружу: старая цель больше не годится
        let left_bounds = out_of_bounds && !self.was_out_of_bounds;
        self.was_out_of_bounds = out_of_bounds;
        if left_bounds {
            crate::log_info(&format!("🧭 Out of bounds at {:?}, retargeting inside", pose.position));
            self.intent.target = None;
            self.intent.avoidance = None;
        }

        let target = match request {
            LocomotionRequest::Hold => {
                self.hold(pose);
                return delta;
            }
            LocomotionRequest::Face(point) => {
                self.hold(pose);
                let desired = yaw_towards(pose.position, point);
                pose.yaw = rotate_towards(pose.yaw, desired, self.config.turn_rate * dt, self.config.angle_tolerance);
                delta.yaw_change = wrap_angle(pose.yaw - start_yaw);
                return delta;
            }
            LocomotionRequest::Wander => {
                let reached = self
                    .intent
                    .target
                    .map_or(true, |target| flat_distance(pose.position, target) <= self.config.arrival_radius);
                let escaped_bounds = out_of_bounds
                    && self.intent.target.map_or(true, |target| !self.in_inner_bounds(target));
                if reached || escaped_bounds {
                    let origin = self.clamp_inner(pose.position);
                    self.generate_new_target(origin, world, rng);
                }
                self.intent.target
            }
            LocomotionRequest::FleeFrom(threat) => {
                let needs_leg = self.intent.target.map_or(true, |target| {
                    let to_target = flat(target) - flat(pose.position);
                    let away = flat(pose.position) - flat(threat);
                    to_target.length() <= self.config.arrival_radius || to_target.dot(away) <= 0.0
                });
                if needs_leg {
                    self.intent.target = Some(self.flee_target(pose, threat, world, rng));
                }
                self.intent.target
            }
            LocomotionRequest::MoveTo(point) => {
                self.intent.target = Some(point);
                Some(point)
            }
        };
        let target = target.unwrap_or(pose.position);

        let mut speed = speed.max(0.0);
        if matches!(request, LocomotionRequest::FleeFrom(_)) && self.flee_budget <= 0.0 {
            speed = 0.0;
            delta.budget_exhausted = true;
        }
        self.intent.speed = speed;

        // Курс: граница > обход > target
        let center = self.config.center();
        let desired = if out_of_bounds {
            self.intent.avoidance = None;
            yaw_towards(pose.position, center)
        } else if let Some(commit) = self.intent.avoidance {
            commit.heading
        } else if flat_distance(pose.position, target) > f32::EPSILON {
            yaw_towards(pose.position, target)
        } else {
            pose.yaw
        };
        pose.yaw = rotate_towards(pose.yaw, desired, self.config.turn_rate * dt, self.config.angle_tolerance);

        if speed <= 0.0 {
            pose.velocity = 0.0;
            self.stuck.clear();
        } else {
            let from = pose.position;
            let mut proposed = from + pose.forward() * speed * dt;
            proposed.y = world.height_at(proposed.x, proposed.z);

            if self.move_allowed(from, proposed, world) {
                pose.position = proposed;
                pose.velocity = speed;
                let moved = flat_distance(from, proposed);
                delta.distance = moved;
                if matches!(request, LocomotionRequest::FleeFrom(_)) {
                    self.flee_budget = (self.flee_budget - moved).max(0.0);
                }
            } else {
                // Полный откат: позицию не трогаем вообще
                pose.velocity = 0.0;
                delta.collided = true;
                self.record_collision();
                self.avoid(pose, world);
            }

            if self.stuck.sample(self.clock, pose.position, &self.config) {
                delta.emergency_escape = self.emergency_escape(pose, request, world, rng);
            }
        }

        if let Some(target) = self.intent.target {
            delta.arrived = flat_distance(pose.position, target) <= self.config.arrival_radius;
        }
        delta.translation = pose.position - start_position;
        delta.yaw_change = wrap_angle(pose.yaw - start_yaw);
        delta
    }

    fn hold(&mut self, pose: &mut AgentPose) {
        pose.velocity = 0.0;
        self.intent.speed = 0.0;
        self.stuck.clear();
    }

    fn tick_avoidance(&mut self, dt: f32) {
        if let Some(commit) = self.intent.avoidance.as_mut() {
            commit.remaining -= dt;
            if commit.remaining <= 0.0 {
                self.intent.avoidance = None;
            }
        }
    }

    fn prune_collisions(&mut self) {
        let window = self.config.collision_window;
        while self
            .collisions
            .front()
            .is_some_and(|time| self.clock - *time > window)
        {
            self.collisions.pop_front();
        }
    }

    fn record_collision(&mut self) {
        if self.collisions.len() == COLLISION_HISTORY_CAP {
            self.collisions.pop_front();
        }
        self.collisions.push_back(self.clock);
    }

    /// Подобрать курс обхода и сразу на него повернуть
    fn avoid(&mut self, pose: &mut AgentPose, world: &dyn WorldQuery) {
        let escalated = self.collisions.len() >= self.config.collision_escalation_count;
        let window = if escalated {
            crate::log(&format!(
                "🔁 Repeated collisions ({} in {:.1}s) → escalated commitment",
                self.collisions.len(),
                self.config.collision_window
            ));
            self.config.escalated_commit_window
        } else {
            self.config.commit_window
        };

        let step = self.config.avoidance_step_degrees.to_radians().max(0.01);
        let increments = (PI / step).floor().max(1.0) as i32;

        let from = pose.position;
        let heading = (1..=increments)
            .flat_map(|i| [i as f32 * step, -(i as f32) * step])
            .map(|offset| wrap_angle(pose.yaw + offset))
            .find(|heading| {
                let ahead = from + forward(*heading) * self.config.avoidance_look_ahead;
                self.path_clear(from, ahead, world)
            })
            // Всё закрыто: разворот
            .unwrap_or_else(|| wrap_angle(pose.yaw + PI));

        pose.yaw = heading;
        self.intent.avoidance = Some(AvoidanceCommit {
            heading,
            remaining: window,
        });
    }

    /// Emergency escape: 4 стороны света, полшага в первую свободную
    fn emergency_escape(
        &mut self,
        pose: &mut AgentPose,
        request: LocomotionRequest,
        world: &dyn WorldQuery,
        rng: &mut impl Rng,
    ) -> bool {
        let center = self.config.center();
        let to_center = (flat(center) - flat(pose.position)).normalize_or_zero();
        let test_distance = self.config.escape_test_distance;

        // Сначала стороны, что ближе к направлению на центр
        let mut directions = [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z];
        directions.sort_by(|a, b| to_center.dot(flat(*b)).total_cmp(&to_center.dot(flat(*a))));

        let from = pose.position;
        let clear = directions
            .into_iter()
            .find(|direction| self.path_clear(from, from + *direction * test_distance, world));

        match clear {
            Some(direction) => {
                let mut escaped = from + direction * (test_distance * 0.5);
                escaped.y = world.height_at(escaped.x, escaped.z);
                pose.position = escaped;
                pose.yaw = yaw_towards(from, from + direction);
                crate::log_info(&format!("🆘 Emergency escape: {:?} → {:?}", from, escaped));
            }
            None => {
                let step = if to_center == Vec2::ZERO {
                    -pose.forward()
                } else {
                    Vec3::new(to_center.x, 0.0, to_center.y)
                };
                let mut nudged = from + step * self.config.center_step;
                nudged.y = world.height_at(nudged.x, nudged.z);
                pose.position = nudged;
                crate::log_warning(&format!(
                    "🆘 Emergency escape: no clear direction at {:?}, nudging toward center",
                    from
                ));
            }
        }

        pose.velocity = 0.0;
        self.intent.avoidance = None;
        self.intent.target = None;
        if request == LocomotionRequest::Wander {
            let origin = self.clamp_inner(pose.position);
            self.generate_new_target(origin, world, rng);
        }
        self.stuck.clear();
        self.emergency_escapes = self.emergency_escapes.saturating_add(1);
        true
    }

    /// Новый wander target вокруг `origin`
    ///
    /// Bounded: `wander_attempts` случайных кандидатов (+ иногда тропа);
    /// ничего не подошло → сам `origin`.
    pub fn generate_new_target(&mut self, origin: Vec3, world: &dyn WorldQuery, rng: &mut impl Rng) -> Vec3 {
        let target = self.pick_wander_target(origin, world, rng);
        self.intent.target = Some(target);
        self.intent.avoidance = None;
        target
    }

    fn pick_wander_target(&self, origin: Vec3, world: &dyn WorldQuery, rng: &mut impl Rng) -> Vec3 {
        if rng.gen::<f32>() < self.config.trail_probability {
            if let Some(sample) = world.trail_sample(rng.gen::<f32>()) {
                let mut candidate = self.clamp_inner(sample);
                candidate.y = world.height_at(candidate.x, candidate.z);
                if self.is_valid_target(candidate, world) {
                    return candidate;
                }
            }
        }

        let [min_radius, max_radius] = self.config.wander_radius;
        for _ in 0..self.config.wander_attempts {
            let angle = rng.gen::<f32>() * std::f32::consts::TAU;
            let radius = min_radius + rng.gen::<f32>() * (max_radius - min_radius).max(0.0);
            let mut candidate = self.clamp_inner(origin + forward(angle) * radius);
            candidate.y = world.height_at(candidate.x, candidate.z);
            if self.is_valid_target(candidate, world) {
                return candidate;
            }
        }

        crate::log_warning(&format!(
            "⚠️ No valid wander target around {:?} after {} attempts, staying put",
            origin, self.config.wander_attempts
        ));
        origin
    }

    /// Конец flee-лега: от угрозы, при блокировке с поворотом
    pub fn flee_target(&self, pose: &AgentPose, threat: Vec3, world: &dyn WorldQuery, rng: &mut impl Rng) -> Vec3 {
        let mut away = (flat(pose.position) - flat(threat)).normalize_or_zero();
        if away == Vec2::ZERO {
            away = flat(pose.forward()).normalize_or_zero();
        }
        let base_yaw = away.x.atan2(away.y);
        let step = self.config.avoidance_step_degrees.to_radians();

        let mut fallback = None;
        for attempt in 0..self.config.flee_target_attempts {
            // 0, +step, -step, +2step, ...
            let magnitude = attempt.div_ceil(2) as f32 * step;
            let offset = if attempt % 2 == 1 { magnitude } else { -magnitude };
            let jitter = rng.gen_range(-0.25_f32..=0.25) * step;
            let direction = forward(base_yaw + offset + jitter);

            let mut candidate = self.clamp_inner(pose.position + direction * self.config.flee_leg_length);
            candidate.y = world.height_at(candidate.x, candidate.z);
            if self.is_valid_target(candidate, world) {
                return candidate;
            }
            fallback.get_or_insert(candidate);
        }

        fallback.unwrap_or(pose.position)
    }

    /// Точка на берегу ближайшего водоёма (со стороны `from`)
    ///
    /// None: воды нет, или берег не нашёлся за bounded шаги.
    pub fn water_approach_point(&self, from: Vec3, world: &dyn WorldQuery) -> Option<Vec3> {
        let source = world.nearest_water_source(from)?;
        let mut direction = (flat(from) - flat(source)).normalize_or_zero();
        if direction == Vec2::ZERO {
            direction = Vec2::Y;
        }

        (1..=self.config.shore_search_attempts).find_map(|i| {
            let reach = i as f32 * self.config.shore_search_step;
            let x = source.x + direction.x * reach;
            let z = source.z + direction.y * reach;
            (!world.is_water_at(x, z)).then(|| Vec3::new(x, world.height_at(x, z), z))
        })
    }

    /// Внешний сигнал от хоста: физика не пускает
    pub fn report_stuck(&mut self) {
        self.stuck.report(&self.config);
    }

    pub fn clear_stuck(&mut self) {
        self.stuck.clear();
    }

    /// Начало бегства: бюджет пути масштабируется энергией
    pub fn begin_flight(&mut self, energy: f32) {
        self.flee_budget = self.config.flee_travel_budget * energy.clamp(0.0, 1.0);
        self.intent.target = None;
    }

    pub fn flee_budget_remaining(&self) -> f32 {
        self.flee_budget
    }

    pub fn flee_budget_exhausted(&self) -> bool {
        self.flee_budget <= 0.0
    }

    pub fn in_bounds(&self, point: Vec3) -> bool {
        self.within(point, self.config.world_half_extent)
    }

    pub fn in_inner_bounds(&self, point: Vec3) -> bool {
        self.within(point, self.inner_extent())
    }

    fn within(&self, point: Vec3, extent: f32) -> bool {
        let center = self.config.center();
        (point.x - center.x).abs() <= extent && (point.z - center.z).abs() <= extent
    }

    fn inner_extent(&self) -> f32 {
        (self.config.world_half_extent - self.config.safety_margin).max(0.0)
    }

    /// Зажать точку в границы минус safety margin
    pub fn clamp_inner(&self, point: Vec3) -> Vec3 {
        let center = self.config.center();
        let extent = self.inner_extent();
        Vec3::new(
            point.x.clamp(center.x - extent, center.x + extent),
            point.y,
            point.z.clamp(center.z - extent, center.z + extent),
        )
    }

    /// Можно ли стоять в точке (границы, вода, препятствия)
    pub fn is_walkable(&self, point: Vec3, world: &dyn WorldQuery) -> bool {
        self.in_bounds(point) && !world.is_water_at(point.x, point.z) && !self.overlaps_obstacle(point, world)
    }

    fn is_valid_target(&self, point: Vec3, world: &dyn WorldQuery) -> bool {
        self.in_inner_bounds(point) && !world.is_water_at(point.x, point.z) && !self.overlaps_obstacle(point, world)
    }

    fn overlaps_obstacle(&self, point: Vec3, world: &dyn WorldQuery) -> bool {
        world
            .nearby_obstacles(point, self.config.agent_radius)
            .iter()
            .any(|obstacle| obstacle.overlaps(point, self.config.agent_radius))
    }

    /// Граница: снаружи можно только приближаться к центру
    fn bounds_allow(&self, from: Vec3, to: Vec3) -> bool {
        if self.in_bounds(to) {
            return true;
        }
        let center = self.config.center();
        !self.in_bounds(from) && flat_distance(to, center) < flat_distance(from, center)
    }

    fn move_allowed(&self, from: Vec3, to: Vec3, world: &dyn WorldQuery) -> bool {
        if !self.bounds_allow(from, to) || world.is_water_at(to.x, to.z) {
            return false;
        }
        // Уже внутри препятствия (спавн/escape): выпускаем наружу
        !world
            .nearby_obstacles(to, self.config.agent_radius)
            .iter()
            .any(|obstacle| {
                obstacle.overlaps(to, self.config.agent_radius)
                    && flat_distance(obstacle.position, to) <= flat_distance(obstacle.position, from)
            })
    }

    /// Свободен ли отрезок для тела агента
    fn path_clear(&self, from: Vec3, to: Vec3, world: &dyn WorldQuery) -> bool {
        if !self.bounds_allow(from, to) {
            return false;
        }

        let length = flat_distance(from, to);
        let samples = ((length / PATH_SAMPLE_SPACING).ceil() as usize).clamp(1, MAX_PATH_SAMPLES);
        let wet = (1..=samples).any(|i| {
            let point = from.lerp(to, i as f32 / samples as f32);
            world.is_water_at(point.x, point.z)
        });
        if wet {
            return false;
        }

        let a = flat(from);
        let b = flat(to);
        let midpoint = from.lerp(to, 0.5);
        let body = self.config.agent_radius;
        !world
            .nearby_obstacles(midpoint, length * 0.5 + body)
            .iter()
            .filter(|obstacle| !obstacle.overlaps(from, body))
            .any(|obstacle| segment_point_distance(a, b, flat(obstacle.position)) < obstacle.radius + body)
    }

    /// Полная очистка (respawn)
    pub fn reset(&mut self) {
        self.intent = NavigationIntent::default();
        self.clock = 0.0;
        self.collisions.clear();
        self.stuck.clear();
        self.flee_budget = self.config.flee_travel_budget;
        self.last_mode = None;
        self.was_out_of_bounds = false;
        self.emergency_escapes = 0;
    }
}

fn segment_point_distance(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a.distance(point);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t).distance(point)
}
