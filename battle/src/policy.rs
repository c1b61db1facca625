//! Action selection for sides no player controls

use tallgrass_protocol::{BattleAction, BattleKind};

use crate::session::BattleSide;

/// Picks the action for an NPC side (a wild combatant or a trainer NPC).
///
/// Whatever is returned still goes through session validation; a rejected
/// choice becomes struggle.
pub trait ActionPolicy: Send + Sync {
    fn choose(&self, own: &BattleSide, opponent: &BattleSide, kind: BattleKind) -> BattleAction;
}

/// Uses the first move with PP left, struggling when there is none
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstUsableMove;

impl ActionPolicy for FirstUsableMove {
    fn choose(&self, own: &BattleSide, _opponent: &BattleSide, _kind: BattleKind) -> BattleAction {
        own.active
            .known_moves
            .iter()
            .find(|m| m.is_usable())
            .map(|m| BattleAction::Attack { move_id: m.id.clone() })
            .unwrap_or(BattleAction::Struggle)
    }
}
