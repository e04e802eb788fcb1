//! Rollout execution: state, kinematics, the stepper and its trace

pub mod kinematics;
pub mod result;
pub mod state;
pub mod stepper;

pub use kinematics::Kinematics;
pub use result::{RewardContribution, SimulatorResult, Step, StepEvent, StepInfo, StepState};
pub use state::SimState;
pub use stepper::{
    effective_max_steps, rollout, run_batch, CancelHandle, Capabilities, RolloutPhase,
    RolloutRequest, RolloutStepper, CANCELLED,
};
