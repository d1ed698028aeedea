use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::camera::Camera;
use super::entity::{is_reserved_attribute, AttributeValue, Entity, EntityId};
use super::geometry::{Rect, Vec2};
use super::physics::{self, RayHit, Segment};
use super::registry::EntityRegistry;
use super::render::Renderer;
use super::spatial::SpatialHash;
use super::tilemap::{EdgePolicy, TileMap, TilemapError};
use crate::content::{LevelData, PresetRecord};

const GENERIC_ID_PREFIX: &str = "entity_";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneConfig {
    pub view_width: f32,
    pub view_height: f32,
    pub default_tile_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            view_width: 960.0,
            view_height: 540.0,
            default_tile_size: 32.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error(transparent)]
    Tilemap(#[from] TilemapError),
    #[error("unknown entity type '{name}'")]
    UnknownEntityType { name: String },
    #[error("attribute '{key}' on entity '{id}' is missing or not numeric")]
    AttributeType { id: EntityId, key: String },
    #[error("entity '{id}' is not in the scene")]
    MissingEntity { id: EntityId },
    #[error("entity '{id}' is already in the scene")]
    DuplicateEntity { id: EntityId },
    #[error("attribute '{key}' is positional; use move_entity or resize_entity")]
    ReservedAttribute { key: String },
    #[error("preset entry {index} ('{name}') is malformed: {reason}")]
    MalformedPreset {
        index: usize,
        name: String,
        reason: String,
    },
}

/// Entities over a tile map, indexed by the tiles their rect corners land on.
///
/// Every entity in `entities` has exactly the buckets produced by
/// [`Scene::tiles_rect_intersects`] for its current rect. All position and
/// size changes go through [`Scene::move_entity`] / [`Scene::resize_entity`],
/// which drop the old buckets before mutating the entity.
#[derive(Debug)]
pub struct Scene {
    name: String,
    sprite_sheet: String,
    tilemap: Arc<TileMap>,
    entities: BTreeMap<EntityId, Entity>,
    spatial: SpatialHash,
    camera: Camera,
    registry: Arc<EntityRegistry>,
    next_generic_id: u64,
}

impl Scene {
    /// An empty scene with the camera centered on the map.
    pub fn new(
        name: impl Into<String>,
        sprite_sheet: impl Into<String>,
        tilemap: Arc<TileMap>,
        registry: Arc<EntityRegistry>,
        config: &SceneConfig,
    ) -> Self {
        let scene_width = tilemap.pixel_width();
        let scene_height = tilemap.pixel_height();
        let mut camera = Camera::new(scene_width, scene_height);
        camera.setup(
            scene_width * 0.5,
            scene_height * 0.5,
            config.view_width,
            config.view_height,
        );
        camera.clamp_view();

        Self {
            name: name.into(),
            sprite_sheet: sprite_sheet.into(),
            tilemap,
            entities: BTreeMap::new(),
            spatial: SpatialHash::new(),
            camera,
            registry,
            next_generic_id: 0,
        }
    }

    /// Builds the tile map and every preset entity of `level`. Any malformed
    /// tile token or preset record fails the whole level.
    pub fn from_level(
        level: &LevelData,
        registry: Arc<EntityRegistry>,
        config: &SceneConfig,
    ) -> Result<Self, SceneError> {
        let tile_size = level.tile_size.unwrap_or(config.default_tile_size);
        let tilemap = TileMap::from_tokens(level.width, level.height, tile_size, &level.tile_data)?;
        let mut scene = Self::new(
            level.name.clone(),
            level.sprite_sheet.clone(),
            Arc::new(tilemap),
            registry,
            config,
        );

        for (index, record) in level.entities.iter().enumerate() {
            let entity = scene
                .entity_from_preset(record)
                .map_err(|reason| SceneError::MalformedPreset {
                    index,
                    name: record.name.clone(),
                    reason,
                })?;
            scene
                .add_entity(entity)
                .map_err(|err| SceneError::MalformedPreset {
                    index,
                    name: record.name.clone(),
                    reason: err.to_string(),
                })?;
        }

        info!(
            scene = %scene.name,
            width = level.width,
            height = level.height,
            entity_count = scene.entities.len(),
            "scene_loaded"
        );
        Ok(scene)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sprite_sheet(&self) -> &str {
        &self.sprite_sheet
    }

    pub fn tilemap(&self) -> &Arc<TileMap> {
        &self.tilemap
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn contains_entity(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn spatial_hash(&self) -> &SpatialHash {
        &self.spatial
    }

    /// Tiles under the four corners of `rect`; corners off the map are
    /// skipped. Left/top edges resolve by floor division, right/bottom edges
    /// are exclusive so a rect ending on a tile boundary stays out of the
    /// next tile.
    pub fn tiles_rect_intersects(&self, rect: &Rect) -> BTreeSet<usize> {
        let x_far = far_policy(rect.width());
        let y_far = far_policy(rect.height());
        let corners = [
            (rect.top_left(), EdgePolicy::Near, EdgePolicy::Near),
            (rect.top_right(), x_far, EdgePolicy::Near),
            (rect.bottom_left(), EdgePolicy::Near, y_far),
            (rect.bottom_right(), x_far, y_far),
        ];
        corners
            .into_iter()
            .filter_map(|(corner, x_edge, y_edge)| {
                self.tilemap.tile_index_at_edge(corner, x_edge, y_edge)
            })
            .collect()
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<(), SceneError> {
        let id = entity.id().clone();
        if self.entities.contains_key(&id) {
            warn!(entity = %id, "entity_add_duplicate");
            return Err(SceneError::DuplicateEntity { id });
        }
        let tiles = self.tiles_rect_intersects(&entity.rect());
        self.spatial.insert(&id, &tiles);
        debug!(entity = %id, tiles = tiles.len(), "entity_added");
        self.entities.insert(id, entity);
        Ok(())
    }

    pub fn remove_entity(&mut self, id: &EntityId) -> Result<Entity, SceneError> {
        let Some(entity) = self.entities.remove(id) else {
            return Err(missing_entity(id, "remove"));
        };
        let tiles = self.tiles_rect_intersects(&entity.rect());
        self.spatial.remove(id, &tiles);
        debug!(entity = %id, "entity_removed");
        Ok(entity)
    }

    pub fn get_entity(&self, id: &EntityId) -> Result<&Entity, SceneError> {
        self.entities
            .get(id)
            .ok_or_else(|| missing_entity(id, "get"))
    }

    /// Reads any attribute, including the positional keys `x`, `y`,
    /// `width` and `height`. `Ok(None)` means the entity lacks the key.
    pub fn get_entity_attribute(
        &self,
        id: &EntityId,
        key: &str,
    ) -> Result<Option<AttributeValue>, SceneError> {
        Ok(self.get_entity(id)?.attribute_value(key))
    }

    pub fn set_entity_attribute(
        &mut self,
        id: &EntityId,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), SceneError> {
        reject_reserved(key)?;
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| missing_entity(id, "set_attribute"))?;
        entity.insert_attribute(key.to_string(), value.into());
        Ok(())
    }

    /// Adds `amount` to a numeric attribute and returns the new value.
    /// Integers stay integers when `amount` is integral.
    pub fn increment_entity_attribute(
        &mut self,
        id: &EntityId,
        key: &str,
        amount: f64,
    ) -> Result<AttributeValue, SceneError> {
        reject_reserved(key)?;
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| missing_entity(id, "increment_attribute"))?;
        let Some(slot) = entity.attribute_slot(key) else {
            warn!(entity = %id, key, "attribute_not_numeric");
            return Err(SceneError::AttributeType {
                id: id.clone(),
                key: key.to_string(),
            });
        };
        let Some(next) = add_numeric(slot, amount) else {
            warn!(entity = %id, key, value = %slot, "attribute_not_numeric");
            return Err(SceneError::AttributeType {
                id: id.clone(),
                key: key.to_string(),
            });
        };
        *slot = next.clone();
        Ok(next)
    }

    /// Moves an entity and re-indexes it. Old buckets are computed from the
    /// old position and dropped before the position changes.
    pub fn move_entity(&mut self, id: &EntityId, position: Vec2) -> Result<(), SceneError> {
        let Some(entity) = self.entities.get(id) else {
            return Err(missing_entity(id, "move"));
        };
        let old_tiles = self.tiles_rect_intersects(&entity.rect());
        let new_tiles = self.tiles_rect_intersects(&entity.rect_at(position));
        self.spatial.remove(id, &old_tiles);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_position(position);
        }
        self.spatial.insert(id, &new_tiles);
        Ok(())
    }

    pub fn move_entity_by(&mut self, id: &EntityId, dx: f32, dy: f32) -> Result<(), SceneError> {
        let position = self.get_entity(id)?.position().offset(dx, dy);
        self.move_entity(id, position)
    }

    pub fn resize_entity(
        &mut self,
        id: &EntityId,
        width: f32,
        height: f32,
    ) -> Result<(), SceneError> {
        let Some(entity) = self.entities.get(id) else {
            return Err(missing_entity(id, "resize"));
        };
        let old_tiles = self.tiles_rect_intersects(&entity.rect());
        let new_tiles =
            self.tiles_rect_intersects(&Rect::new(entity.position(), width, height));
        self.spatial.remove(id, &old_tiles);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_size(width, height);
        }
        self.spatial.insert(id, &new_tiles);
        Ok(())
    }

    /// Builds a preset without adding it. With no `id`, the preset's default
    /// id is used, or failing that the next `entity_<n>` id. Generic ids are
    /// never handed out twice by the same scene.
    pub fn create_entity(&mut self, name: &str, id: Option<&str>) -> Result<Entity, SceneError> {
        let registry = Arc::clone(&self.registry);
        if !registry.contains(name) {
            warn!(preset = name, "entity_type_unknown");
            return Err(SceneError::UnknownEntityType {
                name: name.to_string(),
            });
        }
        let id = match id.or_else(|| registry.default_id(name)) {
            Some(id) => EntityId::from(id),
            None => self.next_generic_id(),
        };
        registry
            .build(name, id)
            .ok_or_else(|| SceneError::UnknownEntityType {
                name: name.to_string(),
            })
    }

    pub fn spawn_entity(
        &mut self,
        name: &str,
        id: Option<&str>,
        position: Vec2,
    ) -> Result<EntityId, SceneError> {
        let entity = self.create_entity(name, id)?.with_position(position);
        let id = entity.id().clone();
        self.add_entity(entity)?;
        Ok(id)
    }

    /// Entities bucketed under any tile `rect` covers, sorted by id.
    pub fn entities_in_rect(&self, rect: &Rect) -> Vec<&Entity> {
        let tiles = self.tilemap.tile_indices_in_rect(rect);
        self.lookup(self.spatial.collect(&tiles))
    }

    pub fn entities_at_tile(&self, index: usize) -> Vec<&Entity> {
        match self.spatial.bucket(index) {
            Some(bucket) => self.lookup(bucket.iter().cloned()),
            None => Vec::new(),
        }
    }

    pub fn tiles_in_view(&self) -> Vec<usize> {
        self.tilemap.tile_indices_in_rect(&self.camera.view_rect())
    }

    /// Visible entities in draw order: top to bottom, then by id.
    pub fn entities_in_view(&self) -> Vec<&Entity> {
        let tiles = self.tiles_in_view();
        let mut visible = self
            .lookup(self.spatial.collect(&tiles))
            .into_iter()
            .filter(|entity| {
                let relative = self.camera.get_relative(entity.position());
                let (width, height) = entity.size();
                self.camera.rect_in_view(&Rect::new(relative, width, height))
            })
            .collect::<Vec<_>>();
        visible.sort_by(|a, b| {
            a.position()
                .y
                .total_cmp(&b.position().y)
                .then_with(|| a.id().cmp(b.id()))
        });
        visible
    }

    /// True when `rect` leaves the map or touches a wall tile.
    pub fn rect_collides_with_walls(&self, rect: &Rect) -> Result<bool, SceneError> {
        let top_left = rect.top_left();
        let bottom_right = rect.bottom_right();
        if top_left.x < 0.0
            || top_left.y < 0.0
            || bottom_right.x > self.tilemap.pixel_width()
            || bottom_right.y > self.tilemap.pixel_height()
        {
            return Ok(true);
        }
        for index in self.tilemap.tile_indices_in_rect(rect) {
            if self.tilemap.tile_is_collidable(index)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// First wall edge `ray` strikes, walking the map from the ray's start.
    pub fn raycast(&self, ray: &Segment) -> Result<Option<RayHit>, SceneError> {
        Ok(physics::raycast(&self.tilemap, ray)?)
    }

    pub fn center_camera_on_entity(&mut self, id: &EntityId) -> Result<(), SceneError> {
        let center = self.get_entity(id)?.center();
        self.camera.center(center.x, center.y);
        Ok(())
    }

    pub fn draw_tiles(&self, renderer: &mut impl Renderer) -> Result<(), SceneError> {
        for index in self.tiles_in_view() {
            let sprite_index = self.tilemap.sprite_index(index)?;
            let position = self.camera.get_relative(self.tilemap.index_to_pixel(index));
            renderer.draw_tile(&self.sprite_sheet, sprite_index, position);
        }
        Ok(())
    }

    pub fn draw_in_view(&self, renderer: &mut impl Renderer) {
        for entity in self.entities_in_view() {
            renderer.draw_entity(entity, self.camera.get_relative(entity.position()));
        }
    }

    fn lookup(&self, ids: impl IntoIterator<Item = EntityId>) -> Vec<&Entity> {
        ids.into_iter()
            .filter_map(|id| self.entities.get(&id))
            .collect()
    }

    fn next_generic_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::new(format!("{GENERIC_ID_PREFIX}{}", self.next_generic_id));
            self.next_generic_id += 1;
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    fn entity_from_preset(&mut self, record: &PresetRecord) -> Result<Entity, String> {
        let mut entity = self
            .create_entity(&record.name, record.id.as_deref())
            .map_err(|err| err.to_string())?;

        let mut position = entity.position();
        let (mut width, mut height) = entity.size();
        for (key, value) in &record.overrides {
            match key.as_str() {
                "x" => position.x = number_override(key, value)?,
                "y" => position.y = number_override(key, value)?,
                "width" => width = size_override(key, value)?,
                "height" => height = size_override(key, value)?,
                _ => entity.insert_attribute(key.clone(), value.clone()),
            }
        }
        entity.set_position(position);
        entity.set_size(width, height);
        Ok(entity)
    }
}

fn far_policy(extent: f32) -> EdgePolicy {
    if extent > 0.0 {
        EdgePolicy::Far
    } else {
        EdgePolicy::Near
    }
}

fn missing_entity(id: &EntityId, operation: &'static str) -> SceneError {
    warn!(entity = %id, operation, "entity_missing");
    SceneError::MissingEntity { id: id.clone() }
}

fn reject_reserved(key: &str) -> Result<(), SceneError> {
    if is_reserved_attribute(key) {
        warn!(key, "attribute_reserved");
        return Err(SceneError::ReservedAttribute {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Integer attributes stay integers while the sum fits in `i64`; anything
/// else, including an overflowing sum, goes through `f64`.
fn add_numeric(value: &Value, amount: f64) -> Option<Value> {
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        if let Some(sum) = value
            .as_i64()
            .and_then(|current| current.checked_add(amount as i64))
        {
            return Some(Value::from(sum));
        }
    }
    let current = value.as_f64()?;
    serde_json::Number::from_f64(current + amount).map(Value::Number)
}

fn number_override(key: &str, value: &Value) -> Result<f32, String> {
    value
        .as_f64()
        .map(|number| number as f32)
        .ok_or_else(|| format!("'{key}' must be a number, got {value}"))
}

fn size_override(key: &str, value: &Value) -> Result<f32, String> {
    let size = number_override(key, value)?;
    if !(size.is_finite() && size > 0.0) {
        return Err(format!("'{key}' must be positive, got {value}"));
    }
    Ok(size)
}
