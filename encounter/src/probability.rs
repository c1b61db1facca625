//! Encounter probability evaluation

use rand::Rng;
use serde::Deserialize;

use crate::index::TileClass;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    #[default]
    Day,
    Night,
}

/// Overworld weather (not to be confused with in-battle weather)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldWeather {
    #[default]
    Clear,
    Rain,
    Snow,
    Fog,
}

/// Environmental conditions at the moment of a roll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    pub time_of_day: TimeOfDay,
    pub weather: WorldWeather,
}

impl Environment {
    pub fn new(time_of_day: TimeOfDay, weather: WorldWeather) -> Self {
        Self {
            time_of_day,
            weather,
        }
    }
}

/// Base rate override for zones whose key contains a substring
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneRateRule {
    pub key_contains: String,
    /// Restrict the rule to one tile class
    #[serde(default)]
    pub tile: Option<TileClass>,
    pub base_rate: f64,
}

impl ZoneRateRule {
    pub fn new(key_contains: impl Into<String>, base_rate: f64) -> Self {
        Self {
            key_contains: key_contains.into(),
            tile: None,
            base_rate,
        }
    }

    fn matches(&self, zone_key: &str, tile: TileClass) -> bool {
        zone_key.contains(&self.key_contains) && self.tile.is_none_or(|t| t == tile)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateTable {
    pub grass_rate: f64,
    pub water_rate: f64,
    /// Checked in order, first match wins
    pub rules: Vec<ZoneRateRule>,
    pub night_multiplier: f64,
    pub rain_multiplier: f64,
    pub ceiling: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            grass_rate: 0.10,
            water_rate: 0.30,
            rules: vec![ZoneRateRule::new("grass2", 0.12)],
            night_multiplier: 1.2,
            rain_multiplier: 1.5,
            ceiling: 0.5,
        }
    }
}

/// Turns a zone, tile and environment into an encounter rate
#[derive(Debug, Clone, Default)]
pub struct ProbabilityEvaluator {
    table: RateTable,
}

impl ProbabilityEvaluator {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Base rate before environmental modifiers
    pub fn base_rate(&self, zone_key: &str, tile: TileClass) -> f64 {
        self.table
            .rules
            .iter()
            .find(|rule| rule.matches(zone_key, tile))
            .map(|rule| rule.base_rate)
            .unwrap_or(match tile {
                TileClass::Grass => self.table.grass_rate,
                TileClass::Water => self.table.water_rate,
            })
    }

    /// Encounter rate in `[0, ceiling]`
    pub fn evaluate(&self, zone_key: &str, tile: TileClass, env: &Environment) -> f64 {
        let mut rate = self.base_rate(zone_key, tile);

        if env.time_of_day == TimeOfDay::Night {
            rate *= self.table.night_multiplier;
        }
        if env.weather == WorldWeather::Rain {
            rate *= self.table.rain_multiplier;
        }

        if rate.is_nan() {
            return 0.0;
        }
        rate.clamp(0.0, self.table.ceiling.max(0.0))
    }

    /// Draw against a rate
    pub fn roll<R: Rng + ?Sized>(&self, rate: f64, rng: &mut R) -> bool {
        let draw: f64 = rng.r#gen();
        Self::accepts(rate, draw)
    }

    /// Whether a draw in `[0, 1)` triggers an encounter at this rate
    pub fn accepts(rate: f64, draw: f64) -> bool {
        draw < rate
    }
}
