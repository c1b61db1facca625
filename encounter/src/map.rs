//! Serde model of a tile map export
//!
//! Only the parts the encounter index reads are modelled: tile layers,
//! object layers and per-tile tileset properties. Everything else in the
//! export is ignored.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Failed to read map file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed map data: {0}")]
    Json(#[from] serde_json::Error),
}

/// A whole tile map
#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    #[serde(default)]
    pub layers: Vec<MapLayer>,
    #[serde(default)]
    pub tilesets: Vec<Tileset>,
}

impl MapData {
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Iterate tile layers in map order
    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            MapLayer::TileLayer(tiles) => Some(tiles),
            _ => None,
        })
    }

    /// Iterate object layers in map order
    pub fn object_groups(&self) -> impl Iterator<Item = &ObjectGroup> {
        self.layers.iter().filter_map(|layer| match layer {
            MapLayer::ObjectGroup(group) => Some(group),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MapLayer {
    #[serde(rename = "tilelayer")]
    TileLayer(TileLayer),
    #[serde(rename = "objectgroup")]
    ObjectGroup(ObjectGroup),
    /// Image layers, group layers and anything newer
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Global tile ids, row-major, 0 = empty
    #[serde(default)]
    pub data: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectGroup {
    pub name: String,
    #[serde(default)]
    pub objects: Vec<MapObject>,
}

/// A named region placed on an object layer
#[derive(Debug, Clone, Deserialize)]
pub struct MapObject {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Object class ("type" in older exports)
    #[serde(default, alias = "class")]
    pub r#type: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tileset {
    #[serde(rename = "firstgid")]
    pub first_gid: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tiles: Vec<TileMeta>,
}

/// Per-tile metadata inside a tileset
#[derive(Debug, Clone, Deserialize)]
pub struct TileMeta {
    /// Local index within the tileset
    pub id: u32,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub value: serde_json::Value,
}

/// Look up a boolean property; `"true"` strings count too
pub fn bool_property(properties: &[Property], name: &str) -> bool {
    properties
        .iter()
        .find(|p| p.name == name)
        .map(|p| match &p.value {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        })
        .unwrap_or(false)
}

/// Look up a non-empty string property
pub fn string_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.as_str())
        .filter(|s| !s.is_empty())
}
