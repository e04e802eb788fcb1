//! Footprints of agents and objects
//!
//! Grid worlds reason in cells; continuous worlds reason in geometry. A rect
//! in a grid world is anchored at the object's position and extends right and
//! down; in a continuous world every shape is centered on the position.

use crate::core::types::Vec2;
use crate::spec::{EnvType, ObjectSpec, Size, World};
use crate::spec::world::Cell;
use geo::{EuclideanDistance, Intersects};
use geo_types::{coord, LineString, Point, Polygon, Rect};

#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    /// Occupied grid cells (sorted, deduplicated)
    Cells { cells: Vec<Cell>, cell_size: f64 },
    Circle { center: Vec2, radius: f64 },
    Shape(Polygon<f64>),
}

impl Footprint {
    /// Footprint of an object in the given world
    ///
    /// `point_radius` gives point-sized objects a reachable extent in
    /// continuous worlds.
    pub fn of_object(obj: &ObjectSpec, world: &World, env_type: EnvType, point_radius: f64) -> Self {
        match env_type {
            EnvType::Grid => Footprint::Cells {
                cells: object_cells(obj, world),
                cell_size: world.cell_size(),
            },
            EnvType::Continuous2d => continuous_shape(obj, point_radius),
        }
    }

    /// Footprint of an agent standing at `position`
    pub fn of_agent(position: Vec2, world: &World, env_type: EnvType, radius: f64) -> Self {
        match env_type {
            EnvType::Grid => Footprint::Cells {
                cells: vec![world.cell_of(position)],
                cell_size: world.cell_size(),
            },
            EnvType::Continuous2d => Footprint::Circle {
                center: position,
                radius,
            },
        }
    }

    /// Whether the point lies inside the footprint (boundary inclusive)
    pub fn contains_point(&self, p: Vec2) -> bool {
        match self {
            Footprint::Cells { cells, cell_size } => {
                let cell = (
                    (p.x / cell_size).floor() as i64,
                    (p.y / cell_size).floor() as i64,
                );
                cells.binary_search(&cell).is_ok()
            }
            Footprint::Circle { center, radius } => center.distance(&p) <= *radius,
            Footprint::Shape(poly) => to_point(p).intersects(poly),
        }
    }

    /// Whether two footprints share any area
    pub fn overlaps(&self, other: &Footprint) -> bool {
        use Footprint::*;
        match (self, other) {
            (Cells { cells: a, .. }, Cells { cells: b, .. }) => {
                a.iter().any(|cell| b.binary_search(cell).is_ok())
            }
            (Circle { center: c1, radius: r1 }, Circle { center: c2, radius: r2 }) => {
                c1.distance(c2) <= r1 + r2
            }
            (Circle { center, radius }, Shape(poly)) | (Shape(poly), Circle { center, radius }) => {
                to_point(*center).euclidean_distance(poly) <= *radius
            }
            (Shape(a), Shape(b)) => a.intersects(b),
            (Cells { cells, cell_size }, other) | (other, Cells { cells, cell_size }) => cells
                .iter()
                .map(|cell| Footprint::Shape(cell_polygon(*cell, *cell_size)))
                .any(|cell_fp| cell_fp.overlaps(other)),
        }
    }
}

fn to_point(p: Vec2) -> Point<f64> {
    Point::new(p.x, p.y)
}

fn cell_polygon(cell: Cell, cell_size: f64) -> Polygon<f64> {
    let min_x = cell.0 as f64 * cell_size;
    let min_y = cell.1 as f64 * cell_size;
    Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: min_x + cell_size, y: min_y + cell_size },
    )
    .to_polygon()
}

fn polygon_at(origin: Vec2, points: &[Vec2]) -> Polygon<f64> {
    let ring: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (origin.x + p.x, origin.y + p.y))
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

fn continuous_shape(obj: &ObjectSpec, point_radius: f64) -> Footprint {
    let pos = obj.position;
    match &obj.size {
        Size::Rect { width, height } if obj.size.is_well_formed() => {
            let (hw, hh) = (width / 2.0, height / 2.0);
            Footprint::Shape(
                Rect::new(
                    coord! { x: pos.x - hw, y: pos.y - hh },
                    coord! { x: pos.x + hw, y: pos.y + hh },
                )
                .to_polygon(),
            )
        }
        Size::Circle { radius } if obj.size.is_well_formed() => Footprint::Circle {
            center: pos,
            radius: *radius,
        },
        Size::Polygon { points } if obj.size.is_well_formed() => {
            Footprint::Shape(polygon_at(pos, points))
        }
        _ => Footprint::Circle {
            center: pos,
            radius: point_radius,
        },
    }
}

/// Cells covered by an object in a grid world; never empty
///
/// Coverage is clipped to the board, so oversized shapes cost no more than
/// the world they sit in.
fn object_cells(obj: &ObjectSpec, world: &World) -> Vec<Cell> {
    let anchor = world.cell_of(obj.position);
    let cs = world.cell_size();

    let mut cells: Vec<Cell> = match &obj.size {
        Size::Rect { width, height } if obj.size.is_well_formed() => {
            let cols = ((width / cs).ceil() as i64).max(1);
            let rows = ((height / cs).ceil() as i64).max(1);
            let far = (
                anchor.0.saturating_add(cols - 1),
                anchor.1.saturating_add(rows - 1),
            );
            board_cells(world, anchor, far).collect()
        }
        Size::Circle { radius } if obj.size.is_well_formed() => {
            let center = world.cell_center(anchor);
            let reach = (radius / cs).ceil() as i64;
            let lo = (anchor.0.saturating_sub(reach), anchor.1.saturating_sub(reach));
            let hi = (anchor.0.saturating_add(reach), anchor.1.saturating_add(reach));
            board_cells(world, lo, hi)
                .filter(|cell| world.cell_center(*cell).distance(&center) <= *radius)
                .collect()
        }
        Size::Polygon { points } if obj.size.is_well_formed() => {
            let poly = polygon_at(obj.position, points);
            let (min, max) = points.iter().fold(
                (Vec2::new(f64::MAX, f64::MAX), Vec2::new(f64::MIN, f64::MIN)),
                |(lo, hi), p| {
                    (
                        Vec2::new(lo.x.min(p.x), lo.y.min(p.y)),
                        Vec2::new(hi.x.max(p.x), hi.y.max(p.y)),
                    )
                },
            );
            let lo = world.cell_of(obj.position + min);
            let hi = world.cell_of(obj.position + max);
            board_cells(world, lo, hi)
                .filter(|cell| to_point(world.cell_center(*cell)).intersects(&poly))
                .collect()
        }
        _ => Vec::new(),
    };

    if cells.is_empty() {
        cells.push(anchor);
    }
    cells.sort_unstable();
    cells.dedup();
    cells
}

/// Cells of the inclusive box `lo..=hi` that lie on the board, row by row
fn board_cells(world: &World, lo: Cell, hi: Cell) -> impl Iterator<Item = Cell> {
    let (x0, x1) = (lo.0.max(0), hi.0.min(world.columns() - 1));
    let (y0, y1) = (lo.1.max(0), hi.1.min(world.rows() - 1));
    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
}
