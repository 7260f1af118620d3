//! AI decision-making module
//!
//! Одна FSM на агента (`BehaviorStateMachine`) + чистый mapping
//! state → animation + idle flavor picker.

pub mod animation;
pub mod fsm;
pub mod idle_picker;
pub mod state;

// Re-export основных типов
pub use animation::{animation_for, SpeedBand};
pub use fsm::{BehaviorStateMachine, FsmCues, FsmInputs, FsmOutput, StateTransition};
pub use idle_picker::{IdleFlavor, IdlePicker};
pub use state::BehaviorState;

#[cfg(test)]
mod fsm_tests;
