//! Editing environments: id allocation, undo/redo, assets and migration

pub mod assets;
pub mod legacy;
pub mod mutator;

pub use assets::{AssetCatalog, AssetDefinition, InMemoryCatalog};
pub use legacy::{migrate_from_legacy, normalize};
pub use mutator::SceneMutator;
