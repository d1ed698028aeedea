mod camera;
mod controller;
mod entity;
mod frame_clock;
mod geometry;
mod physics;
mod registry;
mod render;
mod scene;
mod spatial;
mod tilemap;

pub use camera::Camera;
pub use controller::{Command, ControlMode, Controller, InputEvents, KEYBOARD_DEVICE};
pub use entity::{
    is_reserved_attribute, AttributeValue, Attributes, Entity, EntityId, RESERVED_ATTRIBUTES,
};
pub use frame_clock::{FrameClock, FrameClockConfig, StepPlan};
pub use geometry::{bound_num, point_in_rect, rect_intersects, Rect, Vec2};
pub use physics::{
    collision_slide, raycast, rect_point_of_collision, tile_point_of_collision, RayHit, Segment,
    WallEdge,
};
pub use registry::{
    EntityBuilder, EntityRegistry, FamilyBuilder, PLAYER_ID, PLAYER_PRESET, TOWER_WATCH_PREFIX,
};
pub use render::{DrawCommand, RecordingRenderer, Renderer};
pub use scene::{Scene, SceneConfig, SceneError};
pub use spatial::SpatialHash;
pub use tilemap::{Direction, EdgePolicy, Tile, TileKind, TileMap, TilemapError};
