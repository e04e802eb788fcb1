//! Asset catalog used to resolve `assetId` properties

use crate::core::error::Result;
use crate::spec::{ObjectType, Properties, Size};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Defaults an asset contributes to objects that reference it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    pub id: String,
    /// Informational; the object's own type always wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
    /// Used when the caller does not give a size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default)]
    pub properties: Properties,
}

pub trait AssetCatalog: Send + Sync {
    fn resolve(&self, asset_id: &str) -> Option<AssetDefinition>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    assets: AHashMap<String, AssetDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of asset definitions
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<AssetDefinition> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, definition: AssetDefinition) {
        self.assets.insert(definition.id.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetCatalog for InMemoryCatalog {
    fn resolve(&self, asset_id: &str) -> Option<AssetDefinition> {
        self.assets.get(asset_id).cloned()
    }
}
