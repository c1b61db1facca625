//! Domain types for battle sessions

mod combatant;
mod pokemon_type;
mod stats;
mod status;
mod weather;

pub use combatant::{BattleCombatant, EffectTarget, KnownMove, MoveCategory, MoveEffect};
pub use pokemon_type::Type;
pub use stats::{BaseStats, ComputedStats, StatStages, MAX_STAGE, MIN_STAGE};
pub use status::Status;
pub use weather::Weather;
