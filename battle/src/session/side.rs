//! One side of a battle

use tallgrass_protocol::{CombatId, CombatantSummary, PlayerId};

use crate::types::BattleCombatant;

/// A side: the controlling player (None for wild or NPC), the combatant on
/// the field and the ones waiting behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleSide {
    pub owner: Option<PlayerId>,
    pub active: BattleCombatant,
    pub reserves: Vec<BattleCombatant>,
    /// Escape attempts so far, feeds the flee formula
    pub flee_attempts: u8,
}

impl BattleSide {
    pub fn new(owner: Option<PlayerId>, active: BattleCombatant, reserves: Vec<BattleCombatant>) -> Self {
        Self {
            owner,
            active,
            reserves,
            flee_attempts: 0,
        }
    }

    /// A lone wild combatant
    pub fn wild(active: BattleCombatant) -> Self {
        Self::new(None, active, Vec::new())
    }

    pub fn is_npc(&self) -> bool {
        self.owner.is_none()
    }

    /// Look up a combatant on this side, active or reserve
    pub fn combatant(&self, id: CombatId) -> Option<&BattleCombatant> {
        std::iter::once(&self.active)
            .chain(self.reserves.iter())
            .find(|c| c.combat_id == id)
    }

    pub fn first_living_reserve(&self) -> Option<usize> {
        self.reserves.iter().position(BattleCombatant::is_alive)
    }

    /// Active fainted and nobody left to send in
    pub fn is_defeated(&self) -> bool {
        self.active.is_fainted() && self.first_living_reserve().is_none()
    }

    pub fn can_switch_to(&self, slot: u8) -> bool {
        self.reserves
            .get(slot as usize)
            .is_some_and(BattleCombatant::is_alive)
    }

    /// Swap the active combatant with a reserve.
    ///
    /// Returns the outgoing and incoming ids, or None if the slot is empty
    /// or fainted.
    pub fn switch_to(&mut self, slot: u8) -> Option<(CombatId, CombatId)> {
        if !self.can_switch_to(slot) {
            return None;
        }
        let incoming = &mut self.reserves[slot as usize];
        std::mem::swap(&mut self.active, incoming);
        incoming.on_switch_out();
        Some((incoming.combat_id, self.active.combat_id))
    }

    pub fn summaries(&self, side: u8) -> Vec<CombatantSummary> {
        std::iter::once(&self.active)
            .chain(self.reserves.iter())
            .map(|c| c.summary(side))
            .collect()
    }
}
