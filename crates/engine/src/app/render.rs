use super::entity::{Entity, EntityId};
use super::geometry::Vec2;

/// Drawing collaborator. Positions are view-relative pixels from
/// [`Camera::get_relative`](super::Camera::get_relative); culling beyond
/// the view edge is the renderer's call.
pub trait Renderer {
    fn draw_tile(&mut self, sprite_sheet: &str, sprite_index: (u32, u32), position_px: Vec2);
    fn draw_entity(&mut self, entity: &Entity, position_px: Vec2);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Tile {
        sprite_sheet: String,
        sprite_index: (u32, u32),
        position_px: Vec2,
    },
    Entity {
        id: EntityId,
        sprite: Option<String>,
        position_px: Vec2,
    },
}

/// Headless renderer that records one frame of draw calls.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    commands: Vec<DrawCommand>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn tile_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::Tile { .. }))
            .count()
    }

    pub fn entity_ids(&self) -> Vec<&EntityId> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Entity { id, .. } => Some(id),
                DrawCommand::Tile { .. } => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn draw_tile(&mut self, sprite_sheet: &str, sprite_index: (u32, u32), position_px: Vec2) {
        self.commands.push(DrawCommand::Tile {
            sprite_sheet: sprite_sheet.to_string(),
            sprite_index,
            position_px,
        });
    }

    fn draw_entity(&mut self, entity: &Entity, position_px: Vec2) {
        self.commands.push(DrawCommand::Entity {
            id: entity.id().clone(),
            sprite: entity.sprite().map(ToString::to_string),
            position_px,
        });
    }
}
