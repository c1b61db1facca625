//! Authoritative side of wild encounters and battles.
//!
//! ```text
//! websocket ──► gateway ──► Hub ──► EncounterAuthority ──► BattleSession
//!                            │                                  │
//!                            ▼                                  ▼
//!                     SessionRegistry ◄──────────────── SessionActor (one task each)
//!                                                               │
//!                                              per-player outboxes ◄┘
//! ```
//!
//! Clients propose, the [`EncounterAuthority`] decides, and every accepted
//! battle runs inside its own [`SessionActor`] until it reaches an outcome.

pub mod authority;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod registry;
pub mod session;
pub mod spawn;
pub mod world;

pub use authority::{
    AcceptedEncounter, BattleResult, BattleResultSink, EncounterAuthority, PlayerDirectory, WildSpawner,
    WorldConditions,
};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use hub::Hub;
pub use registry::SessionRegistry;
pub use session::{Outbox, SessionActor, SessionCommand, SessionHandle};
pub use spawn::{SpawnEntry, SpawnError, SpawnTable};
pub use world::{FixedConditions, InMemoryDirectory, LogResults, starter_party};
