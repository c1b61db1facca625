//! Encounter proposals

use tallgrass_protocol::{EncounterMethod, PlayerId, TriggerEncounter};

/// A client's request to start a wild battle.
///
/// Immutable once built. The authority either accepts it, creating a battle
/// session, or rejects it without changing any state.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterProposal {
    pub player_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub zone_key: String,
    pub method: EncounterMethod,
    /// Rate the proposer evaluated (advisory)
    pub rate: f64,
    pub timestamp: u64,
}

impl EncounterProposal {
    /// Attach the sending player to a proposal received over the wire
    pub fn from_trigger(player_id: PlayerId, trigger: &TriggerEncounter) -> Self {
        Self {
            player_id,
            x: trigger.x,
            y: trigger.y,
            zone_key: trigger.zone_key.clone(),
            method: trigger.method,
            rate: trigger.rate,
            timestamp: trigger.timestamp,
        }
    }

    /// Wire form; the player is implied by the connection
    pub fn to_trigger(&self) -> TriggerEncounter {
        TriggerEncounter {
            x: self.x,
            y: self.y,
            zone_key: self.zone_key.clone(),
            method: self.method,
            rate: self.rate,
            timestamp: self.timestamp,
        }
    }
}
