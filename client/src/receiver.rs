use std::sync::Arc;

use anyhow::Result;
use tallgrass_protocol::{BattleId, ServerFrame, ServerMessage};
use tokio::sync::mpsc;
use tracing::debug;

use crate::handler::Handler;
use crate::state::{BattleView, ClientState, EncounterFlags};

/// What the socket task forwards to the [`Receiver`]
#[derive(Debug)]
pub(crate) enum Inbound {
    Frame(ServerFrame),
    /// The socket dropped and a new one is up; anything in flight was lost
    Reconnected,
}

/// Receives messages from the server and dispatches them to a handler.
pub struct Receiver {
    incoming: mpsc::Receiver<Result<Inbound>>,
    state: ClientState,
    flags: Arc<EncounterFlags>,
}

impl Receiver {
    pub(crate) fn new(incoming: mpsc::Receiver<Result<Inbound>>, flags: Arc<EncounterFlags>) -> Self {
        Self {
            incoming,
            state: ClientState::new(),
            flags,
        }
    }

    /// Run the message loop, dispatching events to the handler.
    ///
    /// This will run until the connection is closed or an error occurs.
    pub async fn run<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
        while let Some(inbound) = self.incoming.recv().await {
            match inbound? {
                Inbound::Frame(frame) => self.dispatch_frame(handler, frame).await,
                Inbound::Reconnected => {
                    debug!("Reconnected, clearing encounter flags");
                    self.flags.reset();
                }
            }
        }
        Ok(())
    }

    /// Dispatch a single frame to the handler
    async fn dispatch_frame<H: Handler>(&mut self, handler: &mut H, frame: ServerFrame) {
        let battle = frame.battle_id;

        for msg in frame.messages {
            if self.update_state(&msg) {
                self.dispatch_message(handler, battle, msg).await;
            }
        }
    }

    /// Update internal state based on a message; false if the message is
    /// stale and must not reach the handler
    fn update_state(&mut self, msg: &ServerMessage) -> bool {
        match msg {
            ServerMessage::WildEncounter { success, .. } => {
                self.flags.clear_pending();
                if *success {
                    self.flags.set_in_battle(true);
                }
            }
            ServerMessage::EncounterFailed(_) => self.flags.clear_pending(),
            ServerMessage::BattleStateDelta(delta) => {
                if !self.state.apply_delta(delta) {
                    debug!(
                        battle_id = %delta.battle_id,
                        turn = delta.turn_number,
                        "Dropping stale battle state"
                    );
                    return false;
                }
                // Also restores the flag after a reconnect into a running battle
                self.flags.set_in_battle(!delta.phase.is_terminal());
            }
            ServerMessage::BattleEnded {
                battle_id, outcome, ..
            } => {
                self.state.end_battle(*battle_id, *outcome);
                self.flags.set_in_battle(false);
            }
            ServerMessage::ActionRejected { .. } | ServerMessage::Raw(_) => {}
        }
        true
    }

    /// Dispatch a single message to the appropriate handler method
    async fn dispatch_message<H: Handler>(&self, handler: &mut H, battle: Option<BattleId>, msg: ServerMessage) {
        match msg {
            ServerMessage::WildEncounter {
                battle_id,
                success,
                combatant,
            } => {
                handler.on_wild_encounter(battle_id, success, &combatant).await;
            }
            ServerMessage::EncounterFailed(reason) => {
                handler.on_encounter_failed(reason).await;
            }
            ServerMessage::BattleStateDelta(delta) => {
                handler.on_battle_state_delta(&delta).await;
            }
            ServerMessage::BattleEnded {
                battle_id,
                outcome,
                winner_id,
            } => {
                handler.on_battle_ended(battle_id, outcome, winner_id).await;
            }
            ServerMessage::ActionRejected { battle_id, message } => {
                handler.on_action_rejected(battle_id, &message).await;
            }
            ServerMessage::Raw(content) => {
                handler.on_raw(battle, &content).await;
            }
        }
    }

    /// Latest known state of a battle
    pub fn battle(&self, battle_id: BattleId) -> Option<&BattleView> {
        self.state.battles.get(&battle_id)
    }

    pub fn flags(&self) -> &Arc<EncounterFlags> {
        &self.flags
    }
}
