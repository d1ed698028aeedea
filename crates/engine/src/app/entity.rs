use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::geometry::{Rect, Vec2};

/// Loosely typed attribute value: numbers, strings, bools and nested data.
pub type AttributeValue = Value;
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Keys that map onto the typed spatial fields. They are readable through
/// the attribute accessors but never writable through them.
pub const RESERVED_ATTRIBUTES: [&str; 4] = ["x", "y", "width", "height"];

pub fn is_reserved_attribute(key: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&key)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A game object: typed spatial core plus an open attribute bag.
///
/// `position` anchors the entity's occupancy rect at its top-left corner;
/// the rect spans `width` x `height` pixels from there.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    kind: String,
    position: Vec2,
    width: f32,
    height: f32,
    attributes: Attributes,
}

impl Entity {
    pub fn new(id: EntityId, kind: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            id,
            kind: kind.into(),
            position: Vec2::ZERO,
            width,
            height,
            attributes: Attributes::new(),
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Builder-side attribute insert. Reserved keys are ignored here; set
    /// position and size through the typed builders instead.
    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        if !is_reserved_attribute(key) {
            self.attributes.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        self.rect_at(self.position)
    }

    pub fn rect_at(&self, position: Vec2) -> Rect {
        Rect::new(position, self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        self.rect().center()
    }

    pub fn sprite(&self) -> Option<&str> {
        self.attributes.get("sprite").and_then(Value::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Like [`Entity::attribute`], but also answers the reserved spatial
    /// keys from the typed fields.
    pub fn attribute_value(&self, key: &str) -> Option<AttributeValue> {
        match key {
            "x" => Some(Value::from(self.position.x)),
            "y" => Some(Value::from(self.position.y)),
            "width" => Some(Value::from(self.width)),
            "height" => Some(Value::from(self.height)),
            _ => self.attributes.get(key).cloned(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub(crate) fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub(crate) fn attribute_slot(&mut self, key: &str) -> Option<&mut AttributeValue> {
        self.attributes.get_mut(key)
    }

    pub(crate) fn insert_attribute(&mut self, key: String, value: AttributeValue) {
        self.attributes.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rect_is_anchored_at_position() {
        let entity = Entity::new(EntityId::from("crate"), "prop", 32.0, 16.0)
            .with_position(Vec2::new(64.0, 96.0));
        let rect = entity.rect();
        assert_eq!(rect.top_left(), Vec2::new(64.0, 96.0));
        assert_eq!(rect.bottom_right(), Vec2::new(96.0, 112.0));
        assert_eq!(entity.center(), Vec2::new(80.0, 104.0));
    }

    #[test]
    fn builder_ignores_reserved_keys() {
        let entity = Entity::new(EntityId::from("a"), "npc", 8.0, 8.0)
            .with_attribute("x", 99.0)
            .with_attribute("speed", 3);
        assert_eq!(entity.position(), Vec2::ZERO);
        assert!(entity.attribute("x").is_none());
        assert_eq!(entity.attribute("speed"), Some(&json!(3)));
    }

    #[test]
    fn attribute_value_reads_spatial_fields() {
        let entity = Entity::new(EntityId::from("a"), "npc", 8.0, 4.0)
            .with_position(Vec2::new(1.5, 2.0))
            .with_attribute("sprite", "npc_idle");
        assert_eq!(entity.attribute_value("x"), Some(json!(1.5)));
        assert_eq!(entity.attribute_value("height"), Some(json!(4.0)));
        assert_eq!(entity.sprite(), Some("npc_idle"));
        assert_eq!(entity.attribute_value("missing"), None);
    }

    #[test]
    fn reserved_attribute_set_is_exact() {
        for key in ["x", "y", "width", "height"] {
            assert!(is_reserved_attribute(key));
        }
        assert!(!is_reserved_attribute("dx"));
        assert!(!is_reserved_attribute("sprite"));
    }
}
