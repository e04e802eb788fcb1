//! Blocking objects for agent movement
//!
//! Grid worlds use a cell map for O(1) lookup; continuous worlds test the
//! agent's footprint against each blocking shape.

use crate::core::types::{ObjectId, Vec2};
use crate::spatial::footprint::Footprint;
use crate::spec::world::Cell;
use crate::spec::{EnvType, ObjectSpec, World};
use ahash::AHashMap;

#[derive(Debug, Clone)]
pub enum Blockers {
    /// Blocked cell -> first blocking object (declaration order)
    Grid {
        cells: AHashMap<Cell, ObjectId>,
        world: World,
    },
    Continuous {
        shapes: Vec<(ObjectId, Footprint)>,
        world: World,
        agent_radius: f64,
    },
}

impl Blockers {
    pub fn build(
        objects: &[ObjectSpec],
        world: &World,
        env_type: EnvType,
        agent_radius: f64,
        point_radius: f64,
    ) -> Self {
        let blocking = objects.iter().filter(|o| o.is_blocking());
        match env_type {
            EnvType::Grid => {
                let mut cells = AHashMap::new();
                for obj in blocking {
                    if let Footprint::Cells { cells: covered, .. } =
                        Footprint::of_object(obj, world, env_type, point_radius)
                    {
                        for cell in covered {
                            cells.entry(cell).or_insert_with(|| obj.id.clone());
                        }
                    }
                }
                Blockers::Grid {
                    cells,
                    world: world.clone(),
                }
            }
            EnvType::Continuous2d => Blockers::Continuous {
                shapes: blocking
                    .map(|o| {
                        (
                            o.id.clone(),
                            Footprint::of_object(o, world, env_type, point_radius),
                        )
                    })
                    .collect(),
                world: world.clone(),
                agent_radius,
            },
        }
    }

    /// The object that would block an agent standing at `position`
    pub fn blocker_at(&self, position: Vec2) -> Option<&str> {
        match self {
            Blockers::Grid { cells, world } => cells.get(&world.cell_of(position)).map(String::as_str),
            Blockers::Continuous {
                shapes,
                world,
                agent_radius,
            } => {
                let agent = Footprint::of_agent(position, world, EnvType::Continuous2d, *agent_radius);
                shapes
                    .iter()
                    .find(|(_, fp)| fp.overlaps(&agent))
                    .map(|(id, _)| id.as_str())
            }
        }
    }
}
