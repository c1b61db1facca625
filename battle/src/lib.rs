//! Authoritative battle sessions and their domain types.
//!
//! # Overview
//!
//! `tallgrass-battle` sits between `tallgrass-protocol` (wire format) and the
//! processes that host battles:
//!
//! ```text
//! tallgrass-protocol (wire format)
//!        │
//!        ▼
//! tallgrass-battle (domain types + session + resolver) ← THIS CRATE
//!        │
//!        ├─> tallgrass-server (one session actor per battle)
//!        └─> tallgrass-client (reads deltas)
//! ```
//!
//! # Main Types
//!
//! ## Domain Types
//! - [`Type`] - Elemental types with matchups
//! - [`Status`] - Non-volatile status conditions (Burn, Sleep, ...)
//! - [`Weather`] - In-battle weather
//! - [`StatStages`], [`BaseStats`], [`ComputedStats`] - Stats and stage modifiers
//! - [`BattleCombatant`], [`KnownMove`] - A combatant and its moves
//!
//! ## Sessions
//! - [`BattleSession`] - Phase state machine owning both sides and the action queue
//! - [`QueuedAction`] - One side's action for a turn, with its ordering keys
//! - [`ActionPolicy`] - Action selection for NPC sides
//!
//! # Example Usage
//!
//! ```ignore
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use tallgrass_battle::{BattleSession, SubmitOutcome};
//!
//! let mut session = BattleSession::wild(battle_id, seed, player, party, wild).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(session.seed());
//!
//! session.begin()?;
//! session.choose_npc_actions(&FirstUsableMove);
//! if session.submit(my_actor, action)? == SubmitOutcome::Sealed {
//!     let report = session.resolve_turn(&mut rng)?;
//!     broadcast(session.delta(report.events));
//! }
//! ```

pub mod error;
pub mod policy;
mod resolver;
pub mod session;
pub mod types;

pub use error::{ActionError, SessionError};
pub use policy::{ActionPolicy, FirstUsableMove};
pub use session::{BattleSession, BattleSide, QueuedAction, SubmitOutcome, TurnReport};
pub use types::{
    BaseStats, BattleCombatant, ComputedStats, EffectTarget, KnownMove, MoveCategory, MoveEffect, StatStages,
    Status, Type, Weather,
};

// Re-export commonly used protocol types
pub use tallgrass_protocol::{BattleAction, BattleKind, BattleOutcome, BattlePhase, CombatId, PlayerId, Stat};
