//! Overworld encounter proposals
//!
//! The explorer runs the encounter detector on every movement tick and
//! sends what it proposes without ever waiting on the socket. At most one
//! proposal is outstanding, and none are made during a battle.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tallgrass_encounter::{EncounterDetector, EncounterIndex, EncounterProposal, Environment, GateConfig, RateTable};
use tallgrass_protocol::{ClientCommand, PlayerId};
use tracing::{debug, warn};

use crate::sender::Sender;
use crate::state::EncounterFlags;

/// What one movement tick did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Nothing to propose
    Idle,
    /// A proposal is pending or a battle is running
    Suppressed,
    /// A proposal was queued for the server
    Proposed(EncounterProposal),
    /// The proposal could not be queued and was discarded
    Dropped,
}

/// Per-player encounter detection for the active zone
pub struct Explorer<R: Rng = StdRng> {
    player: PlayerId,
    zone_id: Option<String>,
    index: Arc<EncounterIndex>,
    detector: EncounterDetector,
    sender: Sender,
    flags: Arc<EncounterFlags>,
    rng: R,
}

impl Explorer<StdRng> {
    pub fn new(player: PlayerId, sender: Sender, flags: Arc<EncounterFlags>) -> Self {
        Self::with_rng(
            player,
            sender,
            flags,
            GateConfig::default(),
            RateTable::default(),
            StdRng::from_entropy(),
        )
    }
}

impl<R: Rng> Explorer<R> {
    pub fn with_rng(
        player: PlayerId,
        sender: Sender,
        flags: Arc<EncounterFlags>,
        gate: GateConfig,
        rates: RateTable,
        rng: R,
    ) -> Self {
        Self {
            player,
            zone_id: None,
            index: Arc::new(EncounterIndex::empty()),
            detector: EncounterDetector::new(gate, rates),
            sender,
            flags,
            rng,
        }
    }

    pub fn zone_id(&self) -> Option<&str> {
        self.zone_id.as_deref()
    }

    /// Switch to a new zone and its index, and tell the server.
    ///
    /// A zone without encounter data should be passed an empty index.
    pub fn enter_zone(&mut self, zone_id: &str, index: Arc<EncounterIndex>, now_ms: u64) {
        self.zone_id = Some(zone_id.to_string());
        self.index = index;
        self.detector.enter_zone(self.player, zone_id, now_ms);

        if let Err(e) = self.sender.try_send(&ClientCommand::EnterZone(zone_id.to_string())) {
            warn!(zone = zone_id, error = %e, "Failed to report zone change");
        }
    }

    /// The player was moved without walking (warp, fly, respawn)
    pub fn teleported(&mut self, now_ms: u64) {
        self.detector.teleported(self.player, now_ms);
    }

    /// Run detection for one movement tick at `(x, y)`
    pub fn step(&mut self, now_ms: u64, x: f32, y: f32, env: &Environment) -> StepOutcome {
        if !self.flags.can_propose() {
            return StepOutcome::Suppressed;
        }

        let Some(proposal) = self
            .detector
            .check(&self.index, self.player, now_ms, x, y, env, &mut self.rng)
        else {
            return StepOutcome::Idle;
        };

        if !self.flags.begin_proposal() {
            return StepOutcome::Suppressed;
        }

        match self
            .sender
            .try_send(&ClientCommand::TriggerEncounter(proposal.to_trigger()))
        {
            Ok(()) => {
                debug!(
                    zone = %proposal.zone_key,
                    method = proposal.method.as_str(),
                    rate = proposal.rate,
                    "Encounter proposed"
                );
                StepOutcome::Proposed(proposal)
            }
            Err(e) => {
                self.flags.clear_pending();
                warn!(error = %e, "Dropping encounter proposal");
                StepOutcome::Dropped
            }
        }
    }
}
