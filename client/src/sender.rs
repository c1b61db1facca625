use anyhow::Result;
use tallgrass_encounter::EncounterProposal;
use tallgrass_protocol::{BattleAction, BattleId, ClientCommand, CombatId, PlayerId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Cloneable handle for sending messages to the server.
///
/// This can be passed to handlers and cloned freely.
#[derive(Clone)]
pub struct Sender {
    outgoing: mpsc::Sender<String>,
}

impl Sender {
    pub(crate) fn new(outgoing: mpsc::Sender<String>) -> Self {
        Self { outgoing }
    }

    /// Send a raw string to the server
    pub async fn send_raw(&self, message: String) -> Result<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("Connection closed"))
    }

    pub async fn send(&self, command: &ClientCommand) -> Result<()> {
        self.send_raw(command.to_protocol_string()).await
    }

    /// Queue a command without waiting; fails if the outgoing buffer is full
    pub fn try_send(&self, command: &ClientCommand) -> Result<()> {
        self.outgoing
            .try_send(command.to_protocol_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => anyhow::anyhow!("Outgoing buffer full"),
                TrySendError::Closed(_) => anyhow::anyhow!("Connection closed"),
            })
    }

    /// Identify this connection
    pub async fn hello(&self, player: PlayerId) -> Result<()> {
        self.send(&ClientCommand::Hello(player)).await
    }

    /// Tell the server the player entered a zone
    pub async fn enter_zone(&self, zone: &str) -> Result<()> {
        self.send(&ClientCommand::EnterZone(zone.to_string())).await
    }

    /// Propose an encounter, waiting for buffer space
    pub async fn trigger_encounter(&self, proposal: &EncounterProposal) -> Result<()> {
        self.send(&ClientCommand::TriggerEncounter(proposal.to_trigger())).await
    }

    /// Submit a battle action for one of the player's combatants
    pub async fn submit_action(&self, battle_id: BattleId, actor_id: CombatId, action: BattleAction) -> Result<()> {
        self.send(&ClientCommand::SubmitBattleAction {
            battle_id,
            actor_id,
            action,
        })
        .await
    }
}
