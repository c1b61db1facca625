use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tallgrass_protocol::{BattleId, BattleOutcome, BattlePhase, BattleStateDelta, CombatantSummary};

/// Latest known state of one battle
#[derive(Debug, Clone, PartialEq)]
pub struct BattleView {
    pub battle_id: BattleId,
    pub turn_number: u32,
    pub phase: BattlePhase,
    pub combatants: Vec<CombatantSummary>,
    pub weather: Option<String>,
    pub outcome: Option<BattleOutcome>,
}

impl BattleView {
    fn from_delta(delta: &BattleStateDelta) -> Self {
        Self {
            battle_id: delta.battle_id,
            turn_number: delta.turn_number,
            phase: delta.phase,
            combatants: delta.combatants.clone(),
            weather: delta.weather.clone(),
            outcome: delta.phase.outcome(),
        }
    }

    // A battle that ends reports the turn it ended on, so a terminal delta
    // is newer than a non-terminal one with the same turn number
    fn order_key(turn_number: u32, phase: BattlePhase) -> (u32, bool) {
        (turn_number, phase.is_terminal())
    }

    fn is_older_than(&self, delta: &BattleStateDelta) -> bool {
        Self::order_key(self.turn_number, self.phase) < Self::order_key(delta.turn_number, delta.phase)
    }
}

/// State accumulated by the receiver
#[derive(Debug, Default)]
pub(crate) struct ClientState {
    pub battles: HashMap<BattleId, BattleView>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a delta unless it is not newer than what is already known.
    /// Returns whether it was applied.
    pub fn apply_delta(&mut self, delta: &BattleStateDelta) -> bool {
        match self.battles.get_mut(&delta.battle_id) {
            Some(view) if !view.is_older_than(delta) => false,
            Some(view) => {
                *view = BattleView::from_delta(delta);
                true
            }
            None => {
                self.battles.insert(delta.battle_id, BattleView::from_delta(delta));
                true
            }
        }
    }

    pub fn end_battle(&mut self, battle_id: BattleId, outcome: BattleOutcome) {
        if let Some(view) = self.battles.get_mut(&battle_id) {
            view.outcome = Some(outcome);
            view.phase = outcome.phase();
        }
    }
}

/// Encounter flags shared between the [`Receiver`](crate::Receiver) and
/// the [`Explorer`](crate::Explorer)
#[derive(Debug, Default)]
pub struct EncounterFlags {
    pending: AtomicBool,
    in_battle: AtomicBool,
}

impl EncounterFlags {
    /// A proposal is waiting for the server's answer
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_in_battle(&self) -> bool {
        self.in_battle.load(Ordering::Acquire)
    }

    /// Whether a new proposal may be sent
    pub fn can_propose(&self) -> bool {
        !self.is_pending() && !self.is_in_battle()
    }

    /// Claim the single pending slot; false if one is already outstanding
    pub(crate) fn begin_proposal(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// The server answered (or the proposal never left)
    pub(crate) fn clear_pending(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub(crate) fn set_in_battle(&self, in_battle: bool) {
        self.in_battle.store(in_battle, Ordering::Release);
    }

    /// Forget answers that may have been lost with the old socket
    pub(crate) fn reset(&self) {
        self.clear_pending();
        self.set_in_battle(false);
    }
}
