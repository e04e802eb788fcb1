//! Spatial queries over agents and objects

pub mod blocking;
pub mod footprint;

pub use blocking::Blockers;
pub use footprint::Footprint;
