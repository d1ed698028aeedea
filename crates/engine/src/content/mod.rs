mod defs;
mod levels;

pub use defs::{
    compile_entity_defs, parse_defs_document, DefsCompileError, DefsErrorCode, EntityDef,
    SourceLocation,
};
pub use levels::{LevelData, LevelLoadError, LevelPack, PresetRecord};
