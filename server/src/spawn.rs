//! Wild combatant spawn tables

use std::path::Path;

use rand::{Rng, RngCore};
use serde::Deserialize;
use tallgrass_battle::{BaseStats, BattleCombatant, CombatId, KnownMove, MoveCategory, Type};
use tallgrass_protocol::EncounterMethod;
use thiserror::Error;

use crate::authority::WildSpawner;

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Failed to read spawn table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed spawn table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spawn entry for species {species_id} has an empty level range")]
    LevelRange { species_id: u32 },
}

/// One species that can appear, and where
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnEntry {
    /// Substring the zone key must contain; empty matches every zone
    #[serde(default)]
    pub zone_contains: String,
    pub method: EncounterMethod,
    #[serde(default = "default_weight")]
    pub weight: u32,
    pub species_id: u32,
    pub min_level: u8,
    pub max_level: u8,
    pub types: Vec<Type>,
    pub base_stats: BaseStats,
    #[serde(default = "default_catch_rate")]
    pub catch_rate: u8,
    pub moves: Vec<KnownMove>,
}

fn default_weight() -> u32 {
    1
}

fn default_catch_rate() -> u8 {
    45
}

impl SpawnEntry {
    fn matches(&self, zone_key: &str, method: EncounterMethod) -> bool {
        self.method == method && self.weight > 0 && zone_key.contains(&self.zone_contains)
    }

    fn spawn(&self, rng: &mut dyn RngCore) -> BattleCombatant {
        let level = rng.gen_range(self.min_level..=self.max_level);
        BattleCombatant::new(
            CombatId(0),
            self.species_id,
            level,
            self.types.clone(),
            self.base_stats,
            self.moves.clone(),
        )
        .with_catch_rate(self.catch_rate)
    }
}

/// Weighted spawn lists loaded from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnTable {
    pub entries: Vec<SpawnEntry>,
}

impl SpawnTable {
    pub fn from_json(json: &str) -> Result<Self, SpawnError> {
        let table: Self = serde_json::from_str(json)?;
        if let Some(bad) = table.entries.iter().find(|e| e.min_level > e.max_level) {
            return Err(SpawnError::LevelRange {
                species_id: bad.species_id,
            });
        }
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpawnError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SpawnError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Default for SpawnTable {
    /// A small table covering grass and fishing everywhere
    fn default() -> Self {
        let tackle = KnownMove::attack("tackle", Type::Normal, MoveCategory::Physical, 40, 100, 35);
        let gust = KnownMove::attack("gust", Type::Flying, MoveCategory::Special, 40, 100, 35);
        let water_gun = KnownMove::attack("water_gun", Type::Water, MoveCategory::Special, 40, 100, 25);

        Self {
            entries: vec![
                SpawnEntry {
                    zone_contains: String::new(),
                    method: EncounterMethod::Grass,
                    weight: 3,
                    species_id: 16,
                    min_level: 2,
                    max_level: 5,
                    types: vec![Type::Normal, Type::Flying],
                    base_stats: BaseStats::new(40, 45, 40, 35, 35, 56),
                    catch_rate: 255,
                    moves: vec![tackle.clone(), gust],
                },
                SpawnEntry {
                    zone_contains: String::new(),
                    method: EncounterMethod::Grass,
                    weight: 2,
                    species_id: 19,
                    min_level: 2,
                    max_level: 4,
                    types: vec![Type::Normal],
                    base_stats: BaseStats::new(30, 56, 35, 25, 35, 72),
                    catch_rate: 255,
                    moves: vec![tackle.clone()],
                },
                SpawnEntry {
                    zone_contains: String::new(),
                    method: EncounterMethod::Fishing,
                    weight: 1,
                    species_id: 129,
                    min_level: 5,
                    max_level: 10,
                    types: vec![Type::Water],
                    base_stats: BaseStats::new(20, 10, 55, 15, 20, 80),
                    catch_rate: 255,
                    moves: vec![tackle, water_gun],
                },
            ],
        }
    }
}

impl WildSpawner for SpawnTable {
    fn spawn(&self, zone_key: &str, method: EncounterMethod, rng: &mut dyn RngCore) -> Option<BattleCombatant> {
        let candidates: Vec<&SpawnEntry> = self
            .entries
            .iter()
            .filter(|e| e.matches(zone_key, method))
            .collect();
        let total: u32 = candidates.iter().map(|e| e.weight).sum();
        if total == 0 {
            return None;
        }

        let mut pick = rng.gen_range(0..total);
        for entry in candidates {
            if pick < entry.weight {
                return Some(entry.spawn(rng));
            }
            pick -= entry.weight;
        }
        None
    }
}
