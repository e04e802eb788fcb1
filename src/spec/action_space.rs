//! Action encodings accepted by the environment

use crate::core::types::Vec2;
use serde::{Deserialize, Serialize};

/// Unit moves for discrete actions, indexed by action value
///
/// 0 = up, 1 = down, 2 = left, 3 = right, 4 = stay. Screen coordinates:
/// y grows downwards.
pub const GRID_DIRECTIONS: [Vec2; 5] = [
    Vec2 { x: 0.0, y: -1.0 },
    Vec2 { x: 0.0, y: 1.0 },
    Vec2 { x: -1.0, y: 0.0 },
    Vec2 { x: 1.0, y: 0.0 },
    Vec2 { x: 0.0, y: 0.0 },
];

pub const GRID_ACTION_LABELS: [&str; 5] = ["up", "down", "left", "right", "stay"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpace {
    Discrete { n: u32 },
    /// Per-component bounds of a 2D displacement
    Continuous { low: f64, high: f64 },
}

impl Default for ActionSpace {
    fn default() -> Self {
        ActionSpace::Discrete { n: 4 }
    }
}

/// A single agent's action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Discrete(u32),
    Continuous(Vec2),
}

impl ActionSpace {
    /// Directions available to discrete policies, in action-index order
    pub fn directions(&self) -> &'static [Vec2] {
        match self {
            ActionSpace::Discrete { n } => {
                let n = (*n as usize).min(GRID_DIRECTIONS.len());
                &GRID_DIRECTIONS[..n]
            }
            ActionSpace::Continuous { .. } => &[],
        }
    }

    /// Whether the action is a legal member of this space
    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (ActionSpace::Discrete { n }, Action::Discrete(i)) => i < n,
            (ActionSpace::Continuous { low, high }, Action::Continuous(v)) => {
                v.is_finite() && v.x >= *low && v.x <= *high && v.y >= *low && v.y <= *high
            }
            _ => false,
        }
    }

    /// Label for logging and text output
    pub fn describe(&self, action: &Action) -> String {
        match action {
            Action::Discrete(i) => GRID_ACTION_LABELS
                .get(*i as usize)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("#{}", i)),
            Action::Continuous(v) => format!("({:.2}, {:.2})", v.x, v.y),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            ActionSpace::Discrete { n } => {
                if *n == 0 || *n as usize > GRID_DIRECTIONS.len() {
                    return Err(format!(
                        "discrete action space must have 1..={} actions, got {}",
                        GRID_DIRECTIONS.len(),
                        n
                    ));
                }
            }
            ActionSpace::Continuous { low, high } => {
                if !(low.is_finite() && high.is_finite()) || low > high || !(high - low).is_finite() {
                    return Err(format!(
                        "continuous action bounds are invalid: low={}, high={}",
                        low, high
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discrete_contains() {
        let space = ActionSpace::Discrete { n: 4 };
        assert!(space.contains(&Action::Discrete(3)));
        assert!(!space.contains(&Action::Discrete(4)));
        assert!(!space.contains(&Action::Continuous(Vec2::ZERO)));
        assert_eq!(space.directions().len(), 4);
    }

    #[test]
    fn test_continuous_contains() {
        let space = ActionSpace::Continuous { low: -1.0, high: 1.0 };
        assert!(space.contains(&Action::Continuous(Vec2::new(0.5, -1.0))));
        assert!(!space.contains(&Action::Continuous(Vec2::new(1.5, 0.0))));
        assert!(!space.contains(&Action::Continuous(Vec2::new(f64::NAN, 0.0))));
    }

    #[test]
    fn test_action_untagged_serde() {
        let a: Action = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(a, Action::Discrete(2));
        let b: Action = serde_json::from_value(json!({"x": 0.5, "y": 0.0})).unwrap();
        assert_eq!(b, Action::Continuous(Vec2::new(0.5, 0.0)));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(ActionSpace::Discrete { n: 0 }.validate().is_err());
        assert!(ActionSpace::Discrete { n: 6 }.validate().is_err());
        assert!(ActionSpace::Continuous { low: 1.0, high: -1.0 }.validate().is_err());
        assert!(ActionSpace::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overflowing_span() {
        let wide = ActionSpace::Continuous {
            low: -1e308,
            high: 1e308,
        };
        assert!(wide.validate().is_err());
        let ok = ActionSpace::Continuous {
            low: -1e300,
            high: 1e300,
        };
        assert!(ok.validate().is_ok());
    }
}
