//! Objects placed in an environment

use crate::core::types::{ObjectId, Vec2};
use serde::{Deserialize, Serialize};

/// Open key/value map attached to objects and specs
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Property key referencing an external asset
pub const ASSET_ID_KEY: &str = "assetId";

/// Semantic type of an object
///
/// Serialized as a plain string. Unrecognised names are kept verbatim in
/// `Other` so documents written by newer editors survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectType {
    Wall,
    Goal,
    Trap,
    Key,
    Door,
    Checkpoint,
    Obstacle,
    Region,
    Custom,
    Other(String),
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Wall => "wall",
            ObjectType::Goal => "goal",
            ObjectType::Trap => "trap",
            ObjectType::Key => "key",
            ObjectType::Door => "door",
            ObjectType::Checkpoint => "checkpoint",
            ObjectType::Obstacle => "obstacle",
            ObjectType::Region => "region",
            ObjectType::Custom => "custom",
            ObjectType::Other(name) => name,
        }
    }
}

impl From<String> for ObjectType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "wall" => ObjectType::Wall,
            "goal" => ObjectType::Goal,
            "trap" => ObjectType::Trap,
            "key" => ObjectType::Key,
            "door" => ObjectType::Door,
            "checkpoint" => ObjectType::Checkpoint,
            "obstacle" => ObjectType::Obstacle,
            "region" => ObjectType::Region,
            "custom" => ObjectType::Custom,
            _ => ObjectType::Other(s),
        }
    }
}

impl From<&str> for ObjectType {
    fn from(s: &str) -> Self {
        ObjectType::from(s.to_string())
    }
}

impl From<ObjectType> for String {
    fn from(t: ObjectType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape descriptor of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Size {
    Point,
    Rect { width: f64, height: f64 },
    Circle { radius: f64 },
    /// Vertices relative to the object position
    Polygon { points: Vec<Vec2> },
}

impl Default for Size {
    fn default() -> Self {
        Size::Rect {
            width: 1.0,
            height: 1.0,
        }
    }
}

impl Size {
    /// Whether the shape's dimensions are usable
    pub fn is_well_formed(&self) -> bool {
        match self {
            Size::Point => true,
            Size::Rect { width, height } => {
                *width > 0.0 && *height > 0.0 && width.is_finite() && height.is_finite()
            }
            Size::Circle { radius } => *radius >= 0.0 && radius.is_finite(),
            Size::Polygon { points } => points.len() >= 3 && points.iter().all(Vec2::is_finite),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub position: Vec2,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub properties: Properties,
}

impl ObjectSpec {
    pub fn new(id: impl Into<ObjectId>, object_type: ObjectType, position: Vec2) -> Self {
        Self {
            id: id.into(),
            object_type,
            position,
            size: Size::default(),
            properties: Properties::new(),
        }
    }

    /// Whether agents are stopped by this object
    ///
    /// Doors block until their `open` property is set to true.
    pub fn is_blocking(&self) -> bool {
        match self.object_type {
            ObjectType::Wall | ObjectType::Obstacle => true,
            ObjectType::Door => !self
                .properties
                .get("open")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn asset_id(&self) -> Option<&str> {
        self.properties.get(ASSET_ID_KEY).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_type_round_trips_unknown_names() {
        let t: ObjectType = serde_json::from_value(json!("lava")).unwrap();
        assert_eq!(t, ObjectType::Other("lava".to_string()));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!("lava"));

        let goal: ObjectType = serde_json::from_value(json!("Goal")).unwrap();
        assert_eq!(goal, ObjectType::Goal);
    }

    #[test]
    fn test_object_defaults_to_unit_rect() {
        let obj: ObjectSpec = serde_json::from_value(json!({
            "id": "g1",
            "type": "goal",
            "position": {"x": 4.0, "y": 4.0}
        }))
        .unwrap();
        assert_eq!(obj.size, Size::default());
        assert!(obj.properties.is_empty());
    }

    #[test]
    fn test_door_blocks_until_open() {
        let mut door = ObjectSpec::new("d1", ObjectType::Door, Vec2::new(1.0, 1.0));
        assert!(door.is_blocking());
        door.properties.insert("open".into(), json!(true));
        assert!(!door.is_blocking());

        let goal = ObjectSpec::new("g1", ObjectType::Goal, Vec2::ZERO);
        assert!(!goal.is_blocking());
    }

    #[test]
    fn test_size_shape_tag() {
        let size: Size = serde_json::from_value(json!({"shape": "circle", "radius": 2.0})).unwrap();
        assert_eq!(size, Size::Circle { radius: 2.0 });
        assert!(!Size::Polygon { points: vec![] }.is_well_formed());
    }
}
