//! Queued actions and turn order

use std::cmp::Ordering;

use tallgrass_protocol::{BattleAction, CombatId};

use crate::types::BattleCombatant;

/// Higher goes first
pub fn declared_priority(action: &BattleAction) -> i8 {
    match action {
        BattleAction::Flee | BattleAction::Item { .. } => 2,
        BattleAction::Switch { .. } => 1,
        BattleAction::Attack { .. } | BattleAction::Struggle => 0,
    }
}

/// One side's action for the current turn
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    pub action: BattleAction,
    pub actor_id: CombatId,
    pub side: u8,
    pub declared_priority: i8,
    pub effective_speed: f32,
}

impl QueuedAction {
    pub fn new(action: BattleAction, actor: &BattleCombatant, side: u8) -> Self {
        Self {
            declared_priority: declared_priority(&action),
            effective_speed: actor.effective_speed(),
            action,
            actor_id: actor.combat_id,
            side,
        }
    }

    /// Resolution order: priority, then effective speed, then side index
    pub fn resolution_order(&self, other: &Self) -> Ordering {
        other
            .declared_priority
            .cmp(&self.declared_priority)
            .then_with(|| other.effective_speed.total_cmp(&self.effective_speed))
            .then_with(|| self.side.cmp(&other.side))
    }
}

/// Sort a sealed queue into resolution order
pub fn sort_queue(queue: &mut [QueuedAction]) {
    queue.sort_by(QueuedAction::resolution_order);
}
