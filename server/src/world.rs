//! In-process implementations of the authority's seams

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tallgrass_battle::{BaseStats, BattleCombatant, CombatId, KnownMove, MoveCategory, Type};
use tallgrass_encounter::Environment;
use tallgrass_protocol::PlayerId;
use tracing::info;

use crate::authority::{BattleResult, BattleResultSink, PlayerDirectory, WorldConditions};

/// Parties kept in memory, keyed by player
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    parties: RwLock<HashMap<PlayerId, Vec<BattleCombatant>>>,
    /// Handed to players that were never registered
    fallback: Option<Vec<BattleCombatant>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat every player as known, with a copy of `party` unless registered
    pub fn with_fallback_party(mut self, party: Vec<BattleCombatant>) -> Self {
        self.fallback = Some(party);
        self
    }

    pub fn register(&self, player: PlayerId, party: Vec<BattleCombatant>) {
        self.parties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(player, party);
    }

    pub fn unregister(&self, player: PlayerId) {
        self.parties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&player);
    }
}

impl PlayerDirectory for InMemoryDirectory {
    fn is_known(&self, player: PlayerId) -> bool {
        self.fallback.is_some()
            || self
                .parties
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&player)
    }

    fn party(&self, player: PlayerId) -> Option<Vec<BattleCombatant>> {
        self.parties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}

/// The same conditions in every zone
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedConditions(pub Environment);

impl WorldConditions for FixedConditions {
    fn environment(&self, _zone_id: &str) -> Environment {
        self.0
    }
}

/// Writes finished battles to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResults;

impl BattleResultSink for LogResults {
    fn record(&self, result: BattleResult) {
        info!(
            battle_id = %result.battle_id,
            kind = result.kind.as_str(),
            outcome = result.outcome.as_str(),
            winner = ?result.winner_id,
            turns = result.turns,
            "Battle result recorded"
        );
    }
}

/// The party every new player starts with
pub fn starter_party() -> Vec<BattleCombatant> {
    vec![BattleCombatant::new(
        CombatId(0),
        7,
        5,
        vec![Type::Water],
        BaseStats::new(44, 48, 65, 50, 64, 43),
        vec![
            KnownMove::attack("tackle", Type::Normal, MoveCategory::Physical, 40, 100, 35),
            KnownMove::attack("bubble", Type::Water, MoveCategory::Special, 40, 100, 30),
        ],
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_players_only() {
        let directory = InMemoryDirectory::new();
        directory.register(PlayerId(1), starter_party());

        assert!(directory.is_known(PlayerId(1)));
        assert!(!directory.is_known(PlayerId(2)));
        assert_eq!(directory.party(PlayerId(1)).map(|p| p.len()), Some(1));
        assert!(directory.party(PlayerId(2)).is_none());

        directory.unregister(PlayerId(1));
        assert!(!directory.is_known(PlayerId(1)));
    }

    #[test]
    fn test_fallback_party() {
        let directory = InMemoryDirectory::new().with_fallback_party(starter_party());
        directory.register(PlayerId(1), Vec::new());

        assert!(directory.is_known(PlayerId(2)));
        assert_eq!(directory.party(PlayerId(2)).map(|p| p[0].species_id), Some(7));
        assert_eq!(directory.party(PlayerId(1)), Some(Vec::new()));
    }
}
