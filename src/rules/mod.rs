//! Reward, termination and event rule evaluation

pub mod effects;
pub mod engine;

pub use effects::apply_effects;
pub use engine::{
    describe, FiredEvent, RuleEngine, Termination, TickContext, TickOutcome, MAX_STEPS_REACHED,
};
