//! World bounds and coordinate handling

use crate::core::types::Vec2;
use serde::{Deserialize, Serialize};

/// Kind of environment being simulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvType {
    #[default]
    Grid,
    Continuous2d,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    #[default]
    Grid,
    Cartesian,
}

/// A discrete grid cell (column, row)
pub type Cell = (i64, i64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_size: Option<f64>,
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
}

impl World {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            cell_size: None,
            coordinate_system: CoordinateSystem::Grid,
        }
    }

    /// Cell size, defaulting to 1 when unset
    pub fn cell_size(&self) -> f64 {
        self.cell_size.unwrap_or(1.0)
    }

    /// Number of grid columns (at least 1 for a valid world)
    pub fn columns(&self) -> i64 {
        ((self.width / self.cell_size()).floor() as i64).max(1)
    }

    /// Number of grid rows (at least 1 for a valid world)
    pub fn rows(&self) -> i64 {
        ((self.height / self.cell_size()).floor() as i64).max(1)
    }

    pub fn cell_of(&self, p: Vec2) -> Cell {
        let cs = self.cell_size();
        ((p.x / cs).floor() as i64, (p.y / cs).floor() as i64)
    }

    pub fn cell_origin(&self, cell: Cell) -> Vec2 {
        let cs = self.cell_size();
        Vec2::new(cell.0 as f64 * cs, cell.1 as f64 * cs)
    }

    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        let half = self.cell_size() / 2.0;
        self.cell_origin(cell) + Vec2::new(half, half)
    }

    /// Whether a position lies inside the playable area
    ///
    /// Grid worlds accept any position whose cell is on the board;
    /// continuous worlds accept the closed rectangle `[0, width] x [0, height]`.
    pub fn contains(&self, p: Vec2, env_type: EnvType) -> bool {
        if !p.is_finite() {
            return false;
        }
        match env_type {
            EnvType::Grid => {
                let (cx, cy) = self.cell_of(p);
                p.x >= 0.0 && p.y >= 0.0 && cx < self.columns() && cy < self.rows()
            }
            EnvType::Continuous2d => {
                p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width && p.y <= self.height
            }
        }
    }

    /// Clamp a position into the playable area
    pub fn clamp(&self, p: Vec2, env_type: EnvType) -> Vec2 {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
        let (max_x, max_y) = match env_type {
            EnvType::Grid => {
                let cs = self.cell_size();
                (
                    (self.columns() - 1) as f64 * cs,
                    (self.rows() - 1) as f64 * cs,
                )
            }
            EnvType::Continuous2d => (self.width, self.height),
        };
        Vec2::new(
            sanitize(p.x).clamp(0.0, max_x.max(0.0)),
            sanitize(p.y).clamp(0.0, max_y.max(0.0)),
        )
    }

    /// Check the structural invariants of the world
    pub fn validate(&self) -> Result<(), String> {
        if !(self.width > 0.0 && self.width.is_finite()) {
            return Err(format!("world width must be positive, got {}", self.width));
        }
        if !(self.height > 0.0 && self.height.is_finite()) {
            return Err(format!("world height must be positive, got {}", self.height));
        }
        if let Some(cs) = self.cell_size {
            if !(cs > 0.0 && cs.is_finite()) {
                return Err(format!("cell size must be positive, got {}", cs));
            }
        }
        Ok(())
    }
}
