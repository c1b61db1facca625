//! Client-side encounter detection

use rand::Rng;
use tallgrass_protocol::PlayerId;
use tracing::debug;

use crate::gate::{EncounterGate, GateConfig};
use crate::index::EncounterIndex;
use crate::probability::{Environment, ProbabilityEvaluator, RateTable};
use crate::proposal::EncounterProposal;

/// Decides, every movement tick, whether to propose an encounter.
///
/// The local draw is advisory: it only decides whether a proposal is sent.
/// The index is borrowed from whatever owns the active zone.
#[derive(Debug, Clone, Default)]
pub struct EncounterDetector {
    gate: EncounterGate,
    evaluator: ProbabilityEvaluator,
}

impl EncounterDetector {
    pub fn new(gate: GateConfig, rates: RateTable) -> Self {
        Self {
            gate: EncounterGate::new(gate),
            evaluator: ProbabilityEvaluator::new(rates),
        }
    }

    pub fn gate(&self) -> &EncounterGate {
        &self.gate
    }

    pub fn evaluator(&self) -> &ProbabilityEvaluator {
        &self.evaluator
    }

    /// Reset the gate when the player enters a zone
    pub fn enter_zone(&mut self, player: PlayerId, zone: &str, now_ms: u64) {
        self.gate.enter_zone(player, zone, now_ms);
    }

    /// Reset the gate after a teleport
    pub fn teleported(&mut self, player: PlayerId, now_ms: u64) {
        self.gate.reset(player, now_ms);
    }

    /// Run one movement tick at world position `(x, y)`
    #[allow(clippy::too_many_arguments)]
    pub fn check<R: Rng + ?Sized>(
        &mut self,
        index: &EncounterIndex,
        player: PlayerId,
        now_ms: u64,
        x: f32,
        y: f32,
        env: &Environment,
        rng: &mut R,
    ) -> Option<EncounterProposal> {
        let eligible = if index.has_encounters() {
            index.tile_class_at(x, y).zip(index.zone_at(x, y))
        } else {
            None
        };
        let Some((tile, zone)) = eligible else {
            self.gate.track_position(player, now_ms, x, y);
            return None;
        };

        if !self.gate.should_evaluate(player, now_ms, x, y) {
            return None;
        }

        let rate = self.evaluator.evaluate(&zone.zone_key, tile, env);
        if !self.evaluator.roll(rate, rng) {
            debug!(zone = %zone.zone_key, rate, "Local encounter roll missed");
            return None;
        }

        Some(EncounterProposal {
            player_id: player,
            x,
            y,
            zone_key: zone.zone_key.clone(),
            method: tile.method(),
            rate,
            timestamp: now_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOptions;
    use crate::map::MapData;
    use rand::rngs::mock::StepRng;
    use tallgrass_protocol::EncounterMethod;

    const P: PlayerId = PlayerId(7);

    fn index() -> EncounterIndex {
        let map = MapData::from_json(
            r#"{
            "width": 3, "height": 1, "tilewidth": 10, "tileheight": 10,
            "layers": [
                {"type": "tilelayer", "name": "ground", "width": 3, "height": 1, "data": [1, 2, 3]},
                {"type": "objectgroup", "name": "zones", "objects": [
                    {"id": 1, "x": 0, "y": 0, "width": 20, "height": 10,
                     "properties": [{"name": "zoneKey", "value": "route9-grass2"}]}
                ]}
            ],
            "tilesets": [{"firstgid": 1, "tiles": [
                {"id": 0, "properties": [{"name": "grass", "value": true}]},
                {"id": 1, "properties": [{"name": "water", "value": true}]},
                {"id": 2, "properties": [{"name": "grass", "value": true}]}
            ]}]
        }"#,
        )
        .unwrap();
        EncounterIndex::load(&map, &IndexOptions::default())
    }

    fn detector() -> EncounterDetector {
        EncounterDetector::new(
            GateConfig {
                cooldown_ms: 100,
                steps_required: 1,
                teleport_distance: None,
            },
            RateTable::default(),
        )
    }

    #[test]
    fn test_proposes_on_successful_draw() {
        let index = index();
        let mut detector = detector();
        let mut rng = StepRng::new(0, 0);

        let proposal = detector
            .check(&index, P, 1000, 5.0, 5.0, &Environment::default(), &mut rng)
            .unwrap();
        assert_eq!(proposal.zone_key, "route9-grass2");
        assert_eq!(proposal.method, EncounterMethod::Grass);
        assert!((proposal.rate - 0.12).abs() < 1e-9);
        assert_eq!(proposal.timestamp, 1000);
    }

    #[test]
    fn test_water_tile_proposes_fishing() {
        let index = index();
        let mut detector = detector();
        let mut rng = StepRng::new(0, 0);

        let proposal = detector
            .check(&index, P, 1000, 15.0, 5.0, &Environment::default(), &mut rng)
            .unwrap();
        assert_eq!(proposal.method, EncounterMethod::Fishing);
    }

    #[test]
    fn test_missed_draw_still_consumes_roll() {
        let index = index();
        let mut detector = detector();
        let mut miss = StepRng::new(u64::MAX, 0);
        let mut hit = StepRng::new(0, 0);
        let env = Environment::default();

        assert!(detector.check(&index, P, 1000, 5.0, 5.0, &env, &mut miss).is_none());
        // Cooldown started by the missed roll
        assert!(detector.check(&index, P, 1050, 5.0, 5.0, &env, &mut hit).is_none());
        assert!(detector.check(&index, P, 1100, 5.0, 5.0, &env, &mut hit).is_some());
    }

    #[test]
    fn test_outside_zone_or_plain_tile_never_proposes() {
        let index = index();
        let mut detector = detector();
        let mut rng = StepRng::new(0, 0);
        let env = Environment::default();

        // Grass tile outside every zone
        assert!(detector.check(&index, P, 1000, 25.0, 5.0, &env, &mut rng).is_none());
        // Off the map
        assert!(detector.check(&index, P, 2000, 95.0, 5.0, &env, &mut rng).is_none());

        // Only the position is followed: no steps, no roll
        let state = detector.gate().state(P).unwrap();
        assert_eq!(state.steps_since_last_roll, 0);
        assert_eq!(state.last_roll_ms, None);
        assert_eq!(state.last_position, Some((95.0, 5.0)));
    }

    #[test]
    fn test_empty_index_never_proposes() {
        let mut detector = detector();
        let mut rng = StepRng::new(0, 0);
        let empty = EncounterIndex::empty();
        for t in 0..10 {
            assert!(detector
                .check(&empty, P, t * 1000, 5.0, 5.0, &Environment::default(), &mut rng)
                .is_none());
        }
    }

    #[test]
    fn test_walk_off_encounter_tiles_is_not_a_teleport() {
        let index = index();
        let mut detector = EncounterDetector::new(
            GateConfig {
                cooldown_ms: 0,
                steps_required: 3,
                teleport_distance: Some(8.0),
            },
            RateTable::default(),
        );
        let mut rng = StepRng::new(0, 0);
        let env = Environment::default();

        assert!(detector.check(&index, P, 0, 5.0, 5.0, &env, &mut rng).is_none());
        // Off the map in short hops, then back onto the water tile
        for (t, (x, y)) in [(5.0, 10.0), (5.0, 15.0), (10.0, 15.0), (15.0, 15.0), (15.0, 10.0)]
            .into_iter()
            .enumerate()
        {
            assert!(detector.check(&index, P, 10 + t as u64, x, y, &env, &mut rng).is_none());
        }
        assert!(detector.check(&index, P, 20, 15.0, 5.0, &env, &mut rng).is_none());

        let state = detector.gate().state(P).unwrap();
        assert_eq!(state.steps_since_last_roll, 2);
        assert_eq!(state.last_roll_ms, None);

        // A real jump is still caught while off the encounter tiles
        detector.check(&index, P, 30, 15.0, 90.0, &env, &mut rng);
        assert_eq!(detector.gate().state(P).unwrap().last_roll_ms, Some(30));
    }
}
