//! Errors raised at the session boundary

use tallgrass_protocol::{BattlePhase, CombatId, ItemKind, PlayerId};
use thiserror::Error;

/// Why a submitted action was refused. The session is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Battle is not accepting actions in phase {}", .0.as_str())]
    NotAccepting(BattlePhase),

    #[error("Combatant {0} is not active in this battle")]
    UnknownActor(CombatId),

    #[error("Player {player} does not control combatant {actor}")]
    NotOwner { player: PlayerId, actor: CombatId },

    #[error("Combatant {0} has fainted")]
    ActorFainted(CombatId),

    #[error("An action was already submitted for combatant {0} this turn")]
    AlreadySubmitted(CombatId),

    #[error("Unknown move: {0}")]
    UnknownMove(String),

    #[error("Move {0} has no PP left")]
    NoPp(String),

    #[error("No healthy reserve in slot {0}")]
    InvalidSwitch(u8),

    #[error("Item {item:?} cannot be used here")]
    ItemNotAllowed { item: ItemKind },

    #[error("Cannot flee from this battle")]
    CannotFlee,

    #[error("Struggle is only available when no move has PP")]
    StruggleNotAllowed,
}

/// Illegal use of the session state machine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Invalid phase transition {} -> {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: BattlePhase, to: BattlePhase },

    #[error("Turn can only be resolved while resolving, phase is {}", .0.as_str())]
    NotResolving(BattlePhase),

    #[error("Turn timer expired outside awaiting_actions, phase is {}", .0.as_str())]
    NotAwaiting(BattlePhase),

    #[error("Player {0} is not part of this battle")]
    UnknownPlayer(PlayerId),

    #[error("Battle already ended")]
    Ended,
}
