//! Uniform sampling over an action space

use crate::core::types::Vec2;
use crate::spec::{Action, ActionSpace};
use rand::Rng;

/// Draw one action uniformly from the space
pub fn sample<R: Rng + ?Sized>(rng: &mut R, space: &ActionSpace) -> Action {
    match space {
        ActionSpace::Discrete { n } => Action::Discrete(rng.gen_range(0..(*n).max(1))),
        ActionSpace::Continuous { low, high } => {
            // Uniform sampling needs a finite span; degenerate bounds get their midpoint
            if !(low <= high && (high - low).is_finite()) {
                let mid = low / 2.0 + high / 2.0;
                let mid = if mid.is_finite() { mid } else { 0.0 };
                return Action::Continuous(Vec2::new(mid, mid));
            }
            Action::Continuous(Vec2::new(
                rng.gen_range(*low..=*high),
                rng.gen_range(*low..=*high),
            ))
        }
    }
}

/// One sampled action per agent
pub fn sample_joint<R: Rng + ?Sized>(rng: &mut R, space: &ActionSpace, agents: usize) -> Vec<Action> {
    (0..agents).map(|_| sample(rng, space)).collect()
}
