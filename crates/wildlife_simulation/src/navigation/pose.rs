//! AgentPose: позиция/ориентация агента

use bevy::prelude::*;

use crate::math::forward;

/// Поза агента (принадлежит только агенту, мутирует NavigationPlanner)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentPose {
    pub position: Vec3,
    /// Yaw в радианах (0 → +Z)
    pub yaw: f32,
    /// Текущая скорость (m/s)
    pub velocity: f32,
}

impl AgentPose {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            yaw,
            velocity: 0.0,
        }
    }

    pub fn forward(&self) -> Vec3 {
        forward(self.yaw)
    }

    pub fn is_moving(&self) -> bool {
        self.velocity > 0.05
    }
}
