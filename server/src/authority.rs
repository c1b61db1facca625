//! Server-side encounter authority
//!
//! Clients only *propose* encounters. The authority re-checks every
//! proposal against its own map index, gate and random draw, and either
//! creates a battle session or names the reason it refused. A refusal
//! changes nothing except the player's gate counters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tallgrass_battle::{BattleCombatant, BattleSession};
use tallgrass_encounter::{
    EncounterGate, EncounterIndex, EncounterProposal, Environment, GateConfig, IndexOptions, MapData,
    ProbabilityEvaluator, RateTable,
};
use tallgrass_protocol::{
    BattleId, BattleKind, BattleOutcome, CombatId, CombatantSummary, EncounterFailReason, EncounterMethod,
    PlayerId,
};
use tracing::{debug, info, warn};

/// Who is allowed to battle, and with what
pub trait PlayerDirectory: Send + Sync {
    fn is_known(&self, player: PlayerId) -> bool;

    /// The player's party, lead first
    fn party(&self, player: PlayerId) -> Option<Vec<BattleCombatant>>;
}

/// Picks the wild combatant for an accepted encounter
pub trait WildSpawner: Send + Sync {
    fn spawn(&self, zone_key: &str, method: EncounterMethod, rng: &mut dyn RngCore) -> Option<BattleCombatant>;
}

/// Time of day and weather as the server sees them
pub trait WorldConditions: Send + Sync {
    fn environment(&self, zone_id: &str) -> Environment;
}

/// Receives every finished battle
pub trait BattleResultSink: Send + Sync {
    fn record(&self, result: BattleResult);
}

/// How a battle ended
#[derive(Debug, Clone, PartialEq)]
pub struct BattleResult {
    pub battle_id: BattleId,
    pub kind: BattleKind,
    pub outcome: BattleOutcome,
    pub winner_id: Option<PlayerId>,
    pub participants: Vec<PlayerId>,
    pub turns: u32,
}

impl BattleResult {
    /// Read the result off an ended session
    pub fn from_session(session: &BattleSession) -> Option<Self> {
        Some(Self {
            battle_id: session.battle_id(),
            kind: session.kind(),
            outcome: session.outcome()?,
            winner_id: session.winner_id(),
            participants: session.participants().collect(),
            turns: session.turn_number(),
        })
    }
}

/// An accepted proposal: a wild session still in `intro`
#[derive(Debug)]
pub struct AcceptedEncounter {
    pub session: BattleSession,
    /// The wild combatant as shown to the proposer
    pub wild: CombatantSummary,
}

/// Decides encounter proposals for every connected player
pub struct EncounterAuthority {
    map_dir: Option<PathBuf>,
    index_options: IndexOptions,
    /// Indexes of maps that loaded; ids without a map are never stored
    zones: HashMap<String, Arc<EncounterIndex>>,
    empty: Arc<EncounterIndex>,
    player_zones: HashMap<PlayerId, String>,
    gate: EncounterGate,
    evaluator: ProbabilityEvaluator,
    directory: Arc<dyn PlayerDirectory>,
    spawner: Arc<dyn WildSpawner>,
    conditions: Arc<dyn WorldConditions>,
    rng: ChaCha8Rng,
    next_battle_id: u64,
}

impl EncounterAuthority {
    pub fn new(
        directory: Arc<dyn PlayerDirectory>,
        spawner: Arc<dyn WildSpawner>,
        conditions: Arc<dyn WorldConditions>,
        cooldown_ms: u64,
        seed: u64,
    ) -> Self {
        // The server only sees proposals: each one counts as a step
        let gate = EncounterGate::new(GateConfig {
            cooldown_ms,
            steps_required: 1,
            teleport_distance: None,
        });

        Self {
            map_dir: None,
            index_options: IndexOptions::default(),
            zones: HashMap::new(),
            empty: Arc::new(EncounterIndex::empty()),
            player_zones: HashMap::new(),
            gate,
            evaluator: ProbabilityEvaluator::default(),
            directory,
            spawner,
            conditions,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_battle_id: 1,
        }
    }

    /// Load zone maps lazily from `<dir>/<zone_id>.json`
    pub fn with_map_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.map_dir = Some(dir.into());
        self
    }

    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.evaluator = ProbabilityEvaluator::new(rates);
        self
    }

    pub fn with_index_options(mut self, options: IndexOptions) -> Self {
        self.index_options = options;
        self
    }

    /// Install an already built index for a zone
    pub fn insert_zone(&mut self, zone_id: impl Into<String>, index: EncounterIndex) {
        self.zones.insert(zone_id.into(), Arc::new(index));
    }

    /// Index for a zone, loading it on first use.
    ///
    /// Zones without a loadable map share one empty index and are not
    /// cached, so client-chosen ids cannot grow the cache.
    pub fn zone_index(&mut self, zone_id: &str) -> Arc<EncounterIndex> {
        if let Some(index) = self.zones.get(zone_id) {
            return Arc::clone(index);
        }

        match self.load_zone(zone_id) {
            Some(index) => {
                let index = Arc::new(index);
                self.zones.insert(zone_id.to_string(), Arc::clone(&index));
                index
            }
            None => Arc::clone(&self.empty),
        }
    }

    /// Number of cached zone indexes
    pub fn cached_zones(&self) -> usize {
        self.zones.len()
    }

    fn load_zone(&self, zone_id: &str) -> Option<EncounterIndex> {
        let Some(dir) = &self.map_dir else {
            debug!(zone = zone_id, "No map directory configured, zone has no encounters");
            return None;
        };
        if !is_safe_zone_id(zone_id) {
            warn!(zone = zone_id, "Refusing to load map for malformed zone id");
            return None;
        }

        let path = map_path(dir, zone_id);
        match MapData::from_file(&path) {
            Ok(map) => {
                let index = EncounterIndex::load(&map, &self.index_options);
                info!(
                    zone = zone_id,
                    zones = index.zones().len(),
                    encounters = index.has_encounters(),
                    "Loaded zone map"
                );
                Some(index)
            }
            Err(e) => {
                warn!(zone = zone_id, error = %e, "Zone map failed to load, encounters disabled");
                None
            }
        }
    }

    /// The player moved into a zone; resets their gate counters
    pub fn enter_zone(&mut self, player: PlayerId, zone_id: &str, now_ms: u64) {
        self.zone_index(zone_id);
        self.gate.enter_zone(player, zone_id, now_ms);
        self.player_zones.insert(player, zone_id.to_string());
        debug!(player = %player, zone = zone_id, "Player entered zone");
    }

    pub fn zone_of(&self, player: PlayerId) -> Option<&str> {
        self.player_zones.get(&player).map(String::as_str)
    }

    /// Drop everything known about a disconnected player
    pub fn forget(&mut self, player: PlayerId) {
        self.gate.forget(player);
        self.player_zones.remove(&player);
    }

    /// Accept or reject a proposal.
    ///
    /// Checks run in a fixed order and the first failure is the answer.
    /// `in_battle` is whether the player already has a running session.
    pub fn handle_proposal(
        &mut self,
        proposal: &EncounterProposal,
        now_ms: u64,
        in_battle: bool,
    ) -> Result<AcceptedEncounter, EncounterFailReason> {
        let result = self.decide(proposal, now_ms, in_battle);
        match &result {
            Ok(accepted) => info!(
                player = %proposal.player_id,
                battle_id = %accepted.session.battle_id(),
                zone = %proposal.zone_key,
                species = accepted.wild.species_id,
                "Wild encounter accepted"
            ),
            Err(reason) => debug!(
                player = %proposal.player_id,
                zone = %proposal.zone_key,
                reason = reason.as_str(),
                "Wild encounter rejected"
            ),
        }
        result
    }

    fn decide(
        &mut self,
        proposal: &EncounterProposal,
        now_ms: u64,
        in_battle: bool,
    ) -> Result<AcceptedEncounter, EncounterFailReason> {
        let player = proposal.player_id;
        if !self.directory.is_known(player) {
            return Err(EncounterFailReason::UnknownPlayer);
        }
        if in_battle {
            return Err(EncounterFailReason::InBattle);
        }

        let zone_id = self
            .player_zones
            .get(&player)
            .cloned()
            .ok_or(EncounterFailReason::NoZone)?;
        let index = self.zone_index(&zone_id);
        if !index.has_encounters() {
            return Err(EncounterFailReason::NoZone);
        }

        let tile = index
            .tile_class_at(proposal.x, proposal.y)
            .filter(|tile| tile.method() == proposal.method)
            .ok_or(EncounterFailReason::NoEncounterTile)?;

        let zone = index
            .zone_at(proposal.x, proposal.y)
            .filter(|zone| zone.zone_key == proposal.zone_key)
            .ok_or(EncounterFailReason::NoZone)?;

        if !self.gate.should_evaluate(player, now_ms, proposal.x, proposal.y) {
            return Err(EncounterFailReason::Cooldown);
        }

        let env = self.conditions.environment(&zone_id);
        let rate = self.evaluator.evaluate(&zone.zone_key, tile, &env);
        if !self.evaluator.roll(rate, &mut self.rng) {
            return Err(EncounterFailReason::RateMiss);
        }

        let mut wild = self
            .spawner
            .spawn(&zone.zone_key, proposal.method, &mut self.rng)
            .ok_or(EncounterFailReason::NoCombatant)?;
        let mut party = self
            .directory
            .party(player)
            .filter(|party| party.iter().any(BattleCombatant::is_alive))
            .ok_or(EncounterFailReason::NoCombatant)?;

        // Combat ids are per session: the party first, the wild one last
        let mut next_id = 1;
        for member in &mut party {
            member.combat_id = CombatId(next_id);
            next_id += 1;
        }
        wild.combat_id = CombatId(next_id);

        // A fainted lead cannot open the battle
        if let Some(lead) = party.iter().position(BattleCombatant::is_alive) {
            party.swap(0, lead);
        }

        let battle_id = BattleId(self.next_battle_id);
        self.next_battle_id += 1;
        let seed = self.rng.next_u64();

        let session =
            BattleSession::wild(battle_id, seed, player, party, wild).ok_or(EncounterFailReason::NoCombatant)?;
        let wild = session.sides()[1].active.summary(1);

        Ok(AcceptedEncounter { session, wild })
    }
}

fn is_safe_zone_id(zone_id: &str) -> bool {
    !zone_id.is_empty()
        && zone_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn map_path(dir: &Path, zone_id: &str) -> PathBuf {
    dir.join(format!("{}.json", zone_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::SpawnTable;
    use crate::world::{FixedConditions, InMemoryDirectory};
    use tallgrass_battle::{BaseStats, KnownMove, MoveCategory, Type};
    use tallgrass_protocol::BattlePhase;

    const PLAYER: PlayerId = PlayerId(5);

    // 2x1 tiles of 16px: grass then water, one zone over both
    const MAP: &str = r#"{
        "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
        "layers": [
            {"type": "tilelayer", "name": "ground", "width": 2, "height": 1, "data": [1, 2]},
            {"type": "objectgroup", "name": "zones", "objects": [
                {"id": 1, "x": 0, "y": 0, "width": 32, "height": 16,
                 "properties": [{"name": "zoneKey", "value": "route1-grass"}]}
            ]}
        ],
        "tilesets": [{"firstgid": 1, "tiles": [
            {"id": 0, "properties": [{"name": "grass", "value": true}]},
            {"id": 1, "properties": [{"name": "water", "value": true}]}
        ]}]
    }"#;

    fn starter() -> BattleCombatant {
        BattleCombatant::new(
            CombatId(0),
            4,
            10,
            vec![Type::Fire],
            BaseStats::new(39, 52, 43, 60, 50, 65),
            vec![KnownMove::attack("scratch", Type::Normal, MoveCategory::Physical, 40, 100, 35)],
        )
    }

    fn authority(rate: f64) -> EncounterAuthority {
        let directory = InMemoryDirectory::new();
        directory.register(PLAYER, vec![starter(), starter()]);
        let rates = RateTable {
            grass_rate: rate,
            water_rate: rate,
            rules: Vec::new(),
            ceiling: 1.0,
            ..RateTable::default()
        };
        let mut authority = EncounterAuthority::new(
            Arc::new(directory),
            Arc::new(SpawnTable::default()),
            Arc::new(FixedConditions::default()),
            1_000,
            42,
        )
        .with_rates(rates);
        authority.insert_zone("route1", EncounterIndex::load(&MapData::from_json(MAP).unwrap(), &IndexOptions::default()));
        authority
    }

    fn proposal(x: f32, method: EncounterMethod, zone_key: &str) -> EncounterProposal {
        EncounterProposal {
            player_id: PLAYER,
            x,
            y: 8.0,
            zone_key: zone_key.to_string(),
            method,
            rate: 1.0,
            timestamp: 0,
        }
    }

    fn grass() -> EncounterProposal {
        proposal(8.0, EncounterMethod::Grass, "route1-grass")
    }

    #[test]
    fn test_accepts_valid_proposal() {
        let mut authority = authority(1.0);
        authority.enter_zone(PLAYER, "route1", 0);

        let accepted = authority.handle_proposal(&grass(), 1_000, false).unwrap();
        let session = &accepted.session;
        assert_eq!(session.phase(), BattlePhase::Intro);
        assert_eq!(session.kind(), BattleKind::Wild);
        assert_eq!(session.battle_id(), BattleId(1));
        assert_eq!(session.sides()[0].owner, Some(PLAYER));
        assert_eq!(session.sides()[0].active.combat_id, CombatId(1));
        assert_eq!(session.sides()[0].reserves[0].combat_id, CombatId(2));
        assert_eq!(accepted.wild.combat_id, CombatId(3));
        assert_eq!(accepted.wild.side, 1);
    }

    #[test]
    fn test_battle_ids_increase() {
        let mut authority = authority(1.0);
        authority.enter_zone(PLAYER, "route1", 0);
        let first = authority.handle_proposal(&grass(), 1_000, false).unwrap();
        let second = authority.handle_proposal(&grass(), 2_000, false).unwrap();
        assert_eq!(first.session.battle_id(), BattleId(1));
        assert_eq!(second.session.battle_id(), BattleId(2));
    }

    #[test]
    fn test_unknown_player_checked_first() {
        let mut authority = authority(1.0);
        let stranger = EncounterProposal {
            player_id: PlayerId(99),
            ..grass()
        };
        assert_eq!(
            authority.handle_proposal(&stranger, 1_000, true).unwrap_err(),
            EncounterFailReason::UnknownPlayer
        );
    }

    #[test]
    fn test_in_battle_rejected() {
        let mut authority = authority(1.0);
        authority.enter_zone(PLAYER, "route1", 0);
        assert_eq!(
            authority.handle_proposal(&grass(), 1_000, true).unwrap_err(),
            EncounterFailReason::InBattle
        );
    }

    #[test]
    fn test_no_zone_without_entering_or_without_encounters() {
        let mut authority = authority(1.0);
        assert_eq!(
            authority.handle_proposal(&grass(), 1_000, false).unwrap_err(),
            EncounterFailReason::NoZone
        );

        // No map directory, so the zone loads empty
        authority.enter_zone(PLAYER, "town", 0);
        assert_eq!(
            authority.handle_proposal(&grass(), 1_000, false).unwrap_err(),
            EncounterFailReason::NoZone
        );
    }

    #[test]
    fn test_method_must_match_server_tile() {
        let mut authority = authority(1.0);
        authority.enter_zone(PLAYER, "route1", 0);

        // Grass claimed on the water tile
        let wrong = proposal(24.0, EncounterMethod::Grass, "route1-grass");
        assert_eq!(
            authority.handle_proposal(&wrong, 1_000, false).unwrap_err(),
            EncounterFailReason::NoEncounterTile
        );

        let outside = proposal(100.0, EncounterMethod::Grass, "route1-grass");
        assert_eq!(
            authority.handle_proposal(&outside, 1_000, false).unwrap_err(),
            EncounterFailReason::NoEncounterTile
        );

        let fishing = proposal(24.0, EncounterMethod::Fishing, "route1-grass");
        assert!(authority.handle_proposal(&fishing, 1_000, false).is_ok());
    }

    #[test]
    fn test_zone_key_must_match() {
        let mut authority = authority(1.0);
        authority.enter_zone(PLAYER, "route1", 0);
        let forged = proposal(8.0, EncounterMethod::Grass, "route9-grass2");
        assert_eq!(
            authority.handle_proposal(&forged, 1_000, false).unwrap_err(),
            EncounterFailReason::NoZone
        );
    }

    #[test]
    fn test_cooldown_is_authoritative() {
        let mut authority = authority(0.0);
        authority.enter_zone(PLAYER, "route1", 0);

        // Entering the zone stamps the gate
        assert_eq!(
            authority.handle_proposal(&grass(), 500, false).unwrap_err(),
            EncounterFailReason::Cooldown
        );
        assert_eq!(
            authority.handle_proposal(&grass(), 1_000, false).unwrap_err(),
            EncounterFailReason::RateMiss
        );
        // The miss consumed the roll
        assert_eq!(
            authority.handle_proposal(&grass(), 1_500, false).unwrap_err(),
            EncounterFailReason::Cooldown
        );
    }

    #[test]
    fn test_client_rate_is_ignored() {
        let mut authority = authority(0.0);
        authority.enter_zone(PLAYER, "route1", 0);
        let mut greedy = grass();
        greedy.rate = 1.0;
        assert_eq!(
            authority.handle_proposal(&greedy, 1_000, false).unwrap_err(),
            EncounterFailReason::RateMiss
        );
    }

    #[test]
    fn test_no_combatant_without_party() {
        let directory = InMemoryDirectory::new();
        directory.register(PLAYER, Vec::new());
        let rates = RateTable {
            grass_rate: 1.0,
            ceiling: 1.0,
            rules: Vec::new(),
            ..RateTable::default()
        };
        let mut authority = EncounterAuthority::new(
            Arc::new(directory),
            Arc::new(SpawnTable::default()),
            Arc::new(FixedConditions::default()),
            0,
            1,
        )
        .with_rates(rates);
        authority.insert_zone("route1", EncounterIndex::load(&MapData::from_json(MAP).unwrap(), &IndexOptions::default()));
        authority.enter_zone(PLAYER, "route1", 0);

        assert_eq!(
            authority.handle_proposal(&grass(), 0, false).unwrap_err(),
            EncounterFailReason::NoCombatant
        );
    }

    #[test]
    fn test_fainted_lead_moves_back() {
        let directory = InMemoryDirectory::new();
        let mut fainted = starter();
        fainted.apply_damage(u32::MAX);
        directory.register(PLAYER, vec![fainted, starter()]);
        let mut authority = EncounterAuthority::new(
            Arc::new(directory),
            Arc::new(SpawnTable::default()),
            Arc::new(FixedConditions::default()),
            0,
            1,
        )
        .with_rates(RateTable {
            grass_rate: 1.0,
            ceiling: 1.0,
            rules: Vec::new(),
            ..RateTable::default()
        });
        authority.insert_zone("route1", EncounterIndex::load(&MapData::from_json(MAP).unwrap(), &IndexOptions::default()));
        authority.enter_zone(PLAYER, "route1", 0);

        let accepted = authority.handle_proposal(&grass(), 0, false).unwrap();
        let side = &accepted.session.sides()[0];
        assert_eq!(side.active.combat_id, CombatId(2));
        assert!(side.reserves[0].is_fainted());
    }

    #[test]
    fn test_missing_map_file_degrades() {
        let mut authority = authority(1.0).with_map_dir("/nonexistent/tallgrass-maps");
        authority.enter_zone(PLAYER, "cave", 0);
        assert!(!authority.zone_index("cave").has_encounters());
        assert!(!authority.zone_index("../etc").has_encounters());
        assert_eq!(authority.zone_of(PLAYER), Some("cave"));

        authority.forget(PLAYER);
        assert_eq!(authority.zone_of(PLAYER), None);
    }

    #[test]
    fn test_unloadable_zones_are_not_cached() {
        let mut authority = authority(1.0).with_map_dir("/nonexistent/tallgrass-maps");
        assert_eq!(authority.cached_zones(), 1);

        authority.zone_index("../etc");
        for n in 0..50 {
            authority.enter_zone(PLAYER, &format!("x{}", n), 0);
        }
        assert_eq!(authority.cached_zones(), 1);

        // The installed zone is still served from the cache
        assert!(authority.zone_index("route1").has_encounters());
        assert_eq!(authority.cached_zones(), 1);
    }
}
