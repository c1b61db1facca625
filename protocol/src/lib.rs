use thiserror::Error;

pub mod action;
pub mod client;
pub mod server;

pub use action::{ActionKind, BattleAction, ItemKind};
pub use client::{parse_client_command, ClientCommand, TriggerEncounter};
pub use server::{
    parse_server_frame, parse_server_message, BattleEvent, BattleId, BattleKind, BattleOutcome,
    BattlePhase, BattleStateDelta, CombatId, CombatantSummary, EncounterFailReason,
    EncounterMethod, PlayerId, ServerFrame, ServerMessage, Stat,
};

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Empty message")]
    EmptyMessage,
}
