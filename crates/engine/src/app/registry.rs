use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use super::entity::{Entity, EntityId};
use crate::content::EntityDef;

pub const PLAYER_PRESET: &str = "player";
pub const PLAYER_ID: &str = "player";
pub const TOWER_WATCH_PREFIX: &str = "tower_watch_";

pub type EntityBuilder = Box<dyn Fn(EntityId) -> Entity + Send + Sync>;
pub type FamilyBuilder = Box<dyn Fn(EntityId, u32) -> Entity + Send + Sync>;

struct Preset {
    default_id: Option<String>,
    build: EntityBuilder,
}

/// Maps entity preset names to builders.
///
/// Exact names are checked first, then families: a family prefix followed
/// by a decimal suffix (`tower_watch_3`) hands the suffix to the builder.
#[derive(Default)]
pub struct EntityRegistry {
    presets: HashMap<String, Preset>,
    families: BTreeMap<String, FamilyBuilder>,
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("presets", &self.names())
            .field("families", &self.families.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_presets() -> Self {
        let mut registry = Self::new();
        registry.register_with_default_id(PLAYER_PRESET, PLAYER_ID, build_player);
        registry.register("elder", |id| {
            build_npc(id, "elder", "npc_elder_idle")
                .with_attribute("dialogue", "elder_greeting")
        });
        registry.register("merchant", |id| {
            build_npc(id, "merchant", "npc_merchant_idle")
                .with_attribute("dialogue", "merchant_shop")
                .with_attribute("inventory", serde_json::json!([]))
        });
        registry.register_family(TOWER_WATCH_PREFIX, build_tower_watch);
        registry
    }

    /// Returns true when an existing preset with the same name was replaced.
    pub fn register<F>(&mut self, name: &str, build: F) -> bool
    where
        F: Fn(EntityId) -> Entity + Send + Sync + 'static,
    {
        self.insert_preset(name, None, Box::new(build))
    }

    pub fn register_with_default_id<F>(&mut self, name: &str, default_id: &str, build: F) -> bool
    where
        F: Fn(EntityId) -> Entity + Send + Sync + 'static,
    {
        self.insert_preset(name, Some(default_id.to_string()), Box::new(build))
    }

    pub fn register_family<F>(&mut self, prefix: &str, build: F)
    where
        F: Fn(EntityId, u32) -> Entity + Send + Sync + 'static,
    {
        self.families.insert(prefix.to_string(), Box::new(build));
    }

    pub fn register_def(&mut self, def: EntityDef) -> bool {
        let name = def.name.clone();
        let default_id = def.default_id.clone();
        let build: EntityBuilder = Box::new(move |id| {
            let mut entity = Entity::new(id, def.kind.clone(), def.width, def.height)
                .with_attribute("type", def.kind.clone())
                .with_attribute("state", def.state.clone());
            if let Some(sprite) = &def.sprite {
                entity = entity.with_attribute("sprite", sprite.clone());
            }
            for (key, value) in &def.attributes {
                entity = entity.with_attribute(key, value.clone());
            }
            entity
        });
        self.insert_preset(&name, default_id, build)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name) || self.family_for(name).is_some()
    }

    pub fn default_id(&self, name: &str) -> Option<&str> {
        self.presets
            .get(name)
            .and_then(|preset| preset.default_id.as_deref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.presets.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn build(&self, name: &str, id: EntityId) -> Option<Entity> {
        if let Some(preset) = self.presets.get(name) {
            return Some((preset.build)(id));
        }
        let (build, suffix) = self.family_for(name)?;
        Some(build(id, suffix))
    }

    fn insert_preset(&mut self, name: &str, default_id: Option<String>, build: EntityBuilder) -> bool {
        let replaced = self
            .presets
            .insert(name.to_string(), Preset { default_id, build })
            .is_some();
        if replaced {
            debug!(preset = name, "entity_preset_replaced");
        }
        replaced
    }

    fn family_for(&self, name: &str) -> Option<(&FamilyBuilder, u32)> {
        self.families.iter().find_map(|(prefix, build)| {
            let suffix = name.strip_prefix(prefix.as_str())?;
            if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            suffix.parse::<u32>().ok().map(|value| (build, value))
        })
    }
}

fn build_player(id: EntityId) -> Entity {
    let speed = 3;
    Entity::new(id, "player", 32.0, 32.0)
        .with_attribute("type", "player")
        .with_attribute("state", "idle")
        .with_attribute("sprite", "player_idle_front")
        .with_attribute("dx", 0)
        .with_attribute("dy", 0)
        .with_attribute("speed", speed)
        .with_attribute("sprintSpeed", speed * 2)
        .with_attribute("dodgeSpeed", 4)
        .with_attribute("direction", "down")
        .with_attribute("dodgeCooldown", 400)
        .with_attribute("canDodge", true)
}

fn build_npc(id: EntityId, name: &str, sprite: &str) -> Entity {
    Entity::new(id, "npc", 32.0, 32.0)
        .with_attribute("type", "npc")
        .with_attribute("name", name)
        .with_attribute("state", "idle")
        .with_attribute("sprite", sprite)
        .with_attribute("dx", 0)
        .with_attribute("dy", 0)
        .with_attribute("speed", 1)
}

fn build_tower_watch(id: EntityId, post: u32) -> Entity {
    Entity::new(id, "npc", 32.0, 32.0)
        .with_attribute("type", "npc")
        .with_attribute("name", format!("{TOWER_WATCH_PREFIX}{post}"))
        .with_attribute("state", "watching")
        .with_attribute("sprite", "npc_tower_watch")
        .with_attribute("post", post)
        .with_attribute("dx", 0)
        .with_attribute("dy", 0)
        .with_attribute("speed", 2)
}
