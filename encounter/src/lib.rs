//! Wild encounter detection.
//!
//! This crate holds everything both peers need to decide whether a step on
//! the map may start a wild battle:
//!
//! ```text
//! MapData (tile map export)
//!        │ EncounterIndex::load
//!        ▼
//! EncounterIndex ── tile_class_at / zone_at
//!        │
//!        ▼
//! EncounterGate (cooldown + steps) ──► ProbabilityEvaluator (rate + draw)
//!        │
//!        ▼
//! EncounterProposal ──► server authority (redraws, decides)
//! ```
//!
//! The client runs [`EncounterDetector`] to decide whether to *propose*.
//! The server runs the same index, gate and evaluator with its own
//! configuration and its own random draw; only its answer counts.

pub mod detector;
pub mod gate;
pub mod index;
pub mod map;
pub mod probability;
pub mod proposal;

pub use detector::EncounterDetector;
pub use gate::{EncounterGate, GateConfig, GateState};
pub use index::{EncounterIndex, EncounterZone, IndexOptions, TileClass, TileClassification, ZoneBounds};
pub use map::{MapData, MapError};
pub use probability::{Environment, ProbabilityEvaluator, RateTable, TimeOfDay, WorldWeather, ZoneRateRule};
pub use proposal::EncounterProposal;

pub use tallgrass_protocol::{EncounterMethod, PlayerId};
