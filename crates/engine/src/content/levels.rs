use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::app::Attributes;

const PACK_KEY: &str = "levelData";

/// One level as authored in the level editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tile_data: Vec<String>,
    pub sprite_sheet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<f32>,
    #[serde(default)]
    pub entities: Vec<PresetRecord>,
}

/// A preset entity placement: the preset name, an optional id, and any
/// attribute overrides (`x`/`y`/`width`/`height` set the typed fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub overrides: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PackFile {
    #[serde(rename = "levelData")]
    level_data: BTreeMap<String, LevelData>,
}

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error("failed to read level file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid level json in {path} at {json_path}: {message}")]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
    #[error("no levels found in {path}")]
    Empty { path: PathBuf },
    #[error("level '{name}' not found; available: {available}")]
    UnknownLevel { name: String, available: String },
}

/// Levels keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelPack {
    levels: BTreeMap<String, LevelData>,
}

impl LevelPack {
    /// Accepts either `{"levelData": {name: level}}` or a single bare level.
    /// A bare level without a name is named after `source`'s file stem.
    pub fn from_json_str(source: &Path, raw: &str) -> Result<Self, LevelLoadError> {
        let value = serde_json::from_str::<Value>(raw).map_err(|error| LevelLoadError::Parse {
            path: source.to_path_buf(),
            json_path: ".".to_string(),
            message: error.to_string(),
        })?;

        let mut levels = BTreeMap::new();
        if value.get(PACK_KEY).is_some() {
            let pack: PackFile = deserialize_at(source, value)?;
            for (name, mut level) in pack.level_data {
                level.name = name.clone();
                levels.insert(name, level);
            }
        } else {
            let mut level: LevelData = deserialize_at(source, value)?;
            if level.name.is_empty() {
                level.name = source
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_default();
            }
            levels.insert(level.name.clone(), level);
        }

        if levels.is_empty() {
            return Err(LevelLoadError::Empty {
                path: source.to_path_buf(),
            });
        }
        Ok(Self { levels })
    }

    pub fn load_file(path: &Path) -> Result<Self, LevelLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| LevelLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &raw)
    }

    /// Loads every `*.json` file in `dir`, in file-name order. A level name
    /// repeated in a later file replaces the earlier level.
    pub fn load_dir(dir: &Path) -> Result<Self, LevelLoadError> {
        let read_error = |source| LevelLoadError::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            {
                files.push(path);
            }
        }
        files.sort();

        let mut pack = Self::default();
        for file in &files {
            pack.merge(Self::load_file(file)?);
        }
        if pack.levels.is_empty() {
            return Err(LevelLoadError::Empty {
                path: dir.to_path_buf(),
            });
        }
        info!(
            files = files.len(),
            levels = pack.levels.len(),
            "level_pack_loaded"
        );
        Ok(pack)
    }

    pub fn merge(&mut self, other: LevelPack) {
        for (name, level) in other.levels {
            if self.levels.insert(name.clone(), level).is_some() {
                warn!(level = %name, "level_overridden");
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&LevelData, LevelLoadError> {
        self.levels
            .get(name)
            .ok_or_else(|| LevelLoadError::UnknownLevel {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// The level with the lowest name.
    pub fn first(&self) -> Option<&LevelData> {
        self.levels.values().next()
    }

    pub fn names(&self) -> Vec<&str> {
        self.levels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

fn deserialize_at<T>(source: &Path, value: Value) -> Result<T, LevelLoadError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_path_to_error::deserialize(value).map_err(|error| {
        let json_path = error.path().to_string();
        LevelLoadError::Parse {
            path: source.to_path_buf(),
            json_path,
            message: error.into_inner().to_string(),
        }
    })
}
