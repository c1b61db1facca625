//! Encounter index built once per zone activation
//!
//! Resolves which tiles can start an encounter (grass or water) and which
//! named regions of the map are encounter zones. Loading never fails: a map
//! without the ground layer yields an index with no encounters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tallgrass_protocol::EncounterMethod;
use tracing::{debug, warn};

use crate::map::{bool_property, string_property, MapData, Tileset};

/// Tiled stores flip/rotation flags in the top bits of a gid
const GID_FLAG_MASK: u32 = 0x1FFF_FFFF;

/// Encounter classification of a ground tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileClass {
    Grass,
    Water,
}

impl TileClass {
    /// Encounter method a tile of this class triggers
    pub fn method(&self) -> EncounterMethod {
        match self {
            TileClass::Grass => EncounterMethod::Grass,
            TileClass::Water => EncounterMethod::Fishing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TileClass::Grass => "grass",
            TileClass::Water => "water",
        }
    }
}

/// Global tile ids flagged as grass or water
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileClassification {
    grass: HashSet<u32>,
    water: HashSet<u32>,
}

impl TileClassification {
    /// Resolve tileset metadata into global tile ids.
    ///
    /// A tile flagged both grass and water is only recorded as water.
    pub fn from_tilesets(tilesets: &[Tileset]) -> Self {
        let mut classification = Self::default();

        for tileset in tilesets {
            for tile in &tileset.tiles {
                let Some(gid) = tileset.first_gid.checked_add(tile.id) else {
                    warn!(first_gid = tileset.first_gid, tile = tile.id, "Tile id past the gid range, skipped");
                    continue;
                };
                if bool_property(&tile.properties, "water") {
                    classification.water.insert(gid);
                } else if bool_property(&tile.properties, "grass") {
                    classification.grass.insert(gid);
                }
            }
        }

        classification
    }

    pub fn classify(&self, gid: u32) -> Option<TileClass> {
        let gid = gid & GID_FLAG_MASK;
        if gid == 0 {
            None
        } else if self.water.contains(&gid) {
            Some(TileClass::Water)
        } else if self.grass.contains(&gid) {
            Some(TileClass::Grass)
        } else {
            None
        }
    }

    pub fn grass_count(&self) -> usize {
        self.grass.len()
    }

    pub fn water_count(&self) -> usize {
        self.water.len()
    }
}

/// Axis-aligned bounds in world pixels; right and bottom are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ZoneBounds {
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Non-degenerate: finite, with positive width and height
    pub fn is_valid(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterZone {
    /// Object id from the source map
    pub id: u32,
    pub zone_key: String,
    pub bounds: ZoneBounds,
}

/// Names the index looks for in a map
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Tile layer that must exist for encounters to be possible (case-insensitive)
    pub ground_layer: String,
    /// Object property holding an encounter zone's key
    pub zone_property: String,
    /// Object class that marks a zone keyed by its name instead
    pub zone_class: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            ground_layer: "ground".to_string(),
            zone_property: "zoneKey".to_string(),
            zone_class: "encounter".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct TileGrid {
    name: String,
    width: u32,
    height: u32,
    data: Vec<u32>,
}

impl TileGrid {
    fn gid_at(&self, tx: u32, ty: u32) -> Option<u32> {
        if tx >= self.width || ty >= self.height {
            return None;
        }
        self.data.get((ty * self.width + tx) as usize).copied()
    }
}

/// Fast lookup of encounter-eligible tiles and zones for one map
#[derive(Debug, Clone)]
pub struct EncounterIndex {
    classification: TileClassification,
    zones: Vec<EncounterZone>,
    /// Ground layer first, then every other tile layer in map order
    grids: Vec<TileGrid>,
    tile_width: f32,
    tile_height: f32,
}

impl EncounterIndex {
    /// An index where no encounter can ever happen
    pub fn empty() -> Self {
        Self {
            classification: TileClassification::default(),
            zones: Vec::new(),
            grids: Vec::new(),
            tile_width: 1.0,
            tile_height: 1.0,
        }
    }

    /// Build the index for a map.
    ///
    /// Configuration problems are logged and degrade the index instead of
    /// failing: a missing ground layer or zero tile size gives an empty
    /// index, malformed layers and degenerate zones are skipped.
    pub fn load(map: &MapData, options: &IndexOptions) -> Self {
        if map.tile_width == 0 || map.tile_height == 0 {
            warn!(
                tile_width = map.tile_width,
                tile_height = map.tile_height,
                "Map has zero tile size, encounters disabled"
            );
            return Self::empty();
        }

        let mut grids = Vec::new();
        let mut ground_found = false;

        for layer in map.tile_layers() {
            let expected = layer.width as usize * layer.height as usize;
            let is_ground = layer.name.eq_ignore_ascii_case(&options.ground_layer);

            if layer.data.len() != expected {
                warn!(
                    layer = %layer.name,
                    expected,
                    actual = layer.data.len(),
                    "Tile layer size mismatch, skipping layer"
                );
                continue;
            }

            let grid = TileGrid {
                name: layer.name.clone(),
                width: layer.width,
                height: layer.height,
                data: layer.data.clone(),
            };

            if is_ground && !ground_found {
                ground_found = true;
                grids.insert(0, grid);
            } else {
                grids.push(grid);
            }
        }

        if !ground_found {
            warn!(
                ground_layer = %options.ground_layer,
                "Ground layer not found, encounters disabled for this map"
            );
            return Self::empty();
        }

        let zones = Self::collect_zones(map, options);
        let classification = TileClassification::from_tilesets(&map.tilesets);

        debug!(
            zones = zones.len(),
            grass_tiles = classification.grass_count(),
            water_tiles = classification.water_count(),
            layers = grids.len(),
            "Encounter index loaded"
        );

        Self {
            classification,
            zones,
            grids,
            tile_width: map.tile_width as f32,
            tile_height: map.tile_height as f32,
        }
    }

    fn collect_zones(map: &MapData, options: &IndexOptions) -> Vec<EncounterZone> {
        let mut zones = Vec::new();

        for group in map.object_groups() {
            for object in &group.objects {
                let zone_key = match string_property(&object.properties, &options.zone_property) {
                    Some(key) => key.to_string(),
                    None if object.r#type.eq_ignore_ascii_case(&options.zone_class)
                        && !object.name.is_empty() =>
                    {
                        object.name.clone()
                    }
                    None => continue,
                };

                let bounds = ZoneBounds::from_rect(object.x, object.y, object.width, object.height);
                if !bounds.is_valid() {
                    warn!(
                        object_id = object.id,
                        zone_key = %zone_key,
                        "Degenerate encounter zone bounds, skipping"
                    );
                    continue;
                }

                zones.push(EncounterZone {
                    id: object.id,
                    zone_key,
                    bounds,
                });
            }
        }

        zones
    }

    /// Whether any encounter is possible on this map
    pub fn has_encounters(&self) -> bool {
        !self.grids.is_empty() && !self.zones.is_empty()
    }

    pub fn classification(&self) -> &TileClassification {
        &self.classification
    }

    /// Classify a global tile id
    pub fn classify(&self, gid: u32) -> Option<TileClass> {
        self.classification.classify(gid)
    }

    /// Name of the ground layer, if the map has one
    pub fn ground_layer(&self) -> Option<&str> {
        self.grids.first().map(|g| g.name.as_str())
    }

    /// Classification of the ground at a world position.
    ///
    /// Every tile layer is consulted; water wins over grass.
    pub fn tile_class_at(&self, x: f32, y: f32) -> Option<TileClass> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }

        let tx = (x / self.tile_width).floor() as u32;
        let ty = (y / self.tile_height).floor() as u32;

        let mut found = None;
        for grid in &self.grids {
            match grid.gid_at(tx, ty).and_then(|gid| self.classify(gid)) {
                Some(TileClass::Water) => return Some(TileClass::Water),
                Some(TileClass::Grass) => found = Some(TileClass::Grass),
                None => {}
            }
        }
        found
    }

    /// First zone, in registration order, containing the point
    pub fn zone_at(&self, x: f32, y: f32) -> Option<&EncounterZone> {
        self.zones.iter().find(|zone| zone.bounds.contains(x, y))
    }

    pub fn zones(&self) -> &[EncounterZone] {
        &self.zones
    }
}

impl Default for EncounterIndex {
    fn default() -> Self {
        Self::empty()
    }
}
