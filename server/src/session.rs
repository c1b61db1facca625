//! Session actors
//!
//! Every running battle is owned by one [`SessionActor`] task. Players
//! reach it through a cloneable [`SessionHandle`] that posts commands to a
//! bounded inbox; the actor is the only writer of its [`BattleSession`].
//!
//! The turn timer is a sleep raced against the inbox. It is dropped as soon
//! as the queue seals, and resolution only runs in the `resolving` phase, so
//! a turn is resolved at most once.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tallgrass_battle::{ActionError, ActionPolicy, BattleSession, FirstUsableMove, SubmitOutcome};
use tallgrass_protocol::{
    BattleAction, BattleEvent, BattleId, BattlePhase, BattleStateDelta, CombatId, PlayerId, ServerFrame,
    ServerMessage,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::authority::{BattleResult, BattleResultSink};
use crate::error::{Result, ServerError};

/// Frames queued for one connected player
pub type Outbox = mpsc::UnboundedSender<ServerFrame>;

pub enum SessionCommand {
    Submit {
        player: PlayerId,
        actor_id: CombatId,
        action: BattleAction,
        reply: oneshot::Sender<std::result::Result<SubmitOutcome, ActionError>>,
    },
    Disconnect {
        player: PlayerId,
    },
    /// The player is back on a new connection
    Reconnect {
        player: PlayerId,
        outbox: Outbox,
    },
    Snapshot {
        reply: oneshot::Sender<BattleStateDelta>,
    },
}

/// Client-facing handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    battle_id: BattleId,
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn battle_id(&self) -> BattleId {
        self.battle_id
    }

    /// Whether the actor has finished
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServerError::InboxClosed(self.battle_id))
    }

    /// Submit an action for a combatant the player controls
    pub async fn submit(&self, player: PlayerId, actor_id: CombatId, action: BattleAction) -> Result<SubmitOutcome> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Submit {
            player,
            actor_id,
            action,
            reply,
        })
        .await?;

        Ok(reply_rx.await.map_err(ServerError::ReplyDropped)??)
    }

    /// The player left; aborts or forfeits depending on the phase
    pub async fn disconnect(&self, player: PlayerId) -> Result<()> {
        self.send(SessionCommand::Disconnect { player }).await
    }

    /// Route the player's frames to a new connection
    pub async fn reconnect(&self, player: PlayerId, outbox: Outbox) -> Result<()> {
        self.send(SessionCommand::Reconnect { player, outbox }).await
    }

    /// Current state with an empty log
    pub async fn snapshot(&self) -> Result<BattleStateDelta> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        reply_rx.await.map_err(ServerError::ReplyDropped)
    }
}

/// Owns one battle from `intro` to its outcome
pub struct SessionActor {
    session: BattleSession,
    rng: ChaCha8Rng,
    commands: mpsc::Receiver<SessionCommand>,
    outboxes: Vec<(PlayerId, Outbox)>,
    policy: Box<dyn ActionPolicy>,
    turn_timeout: Duration,
    results: Arc<dyn BattleResultSink>,
}

impl SessionActor {
    pub fn new(
        session: BattleSession,
        outboxes: Vec<(PlayerId, Outbox)>,
        results: Arc<dyn BattleResultSink>,
        turn_timeout: Duration,
        inbox_capacity: usize,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(inbox_capacity.max(1));
        let handle = SessionHandle {
            battle_id: session.battle_id(),
            commands: commands_tx,
        };
        let actor = Self {
            rng: ChaCha8Rng::seed_from_u64(session.seed()),
            session,
            commands,
            outboxes,
            policy: Box::new(FirstUsableMove),
            turn_timeout,
            results,
        };
        (actor, handle)
    }

    /// Policy for sides nobody controls
    pub fn with_policy(mut self, policy: impl ActionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Drive the battle to its end and hand back the final session
    pub async fn run(mut self) -> BattleSession {
        // Commands queued before the task started still see `intro`
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }

        if !self.session.is_ended() {
            match self.session.begin() {
                Ok(()) => self.broadcast_delta(Vec::new()),
                Err(e) => warn!(battle_id = %self.session.battle_id(), error = %e, "Battle failed to start"),
            }
        }

        while !self.session.is_ended() {
            if self.session.phase() == BattlePhase::AwaitingActions {
                self.session.choose_npc_actions(self.policy.as_ref());
            }
            if self.session.phase() == BattlePhase::AwaitingActions && !self.await_actions().await {
                debug!(battle_id = %self.session.battle_id(), "Session inbox closed, stopping actor");
                return self.session;
            }

            match self.session.phase() {
                BattlePhase::Resolving => self.resolve(),
                phase if phase.is_terminal() => {
                    let log = self.session.take_pending_log();
                    self.broadcast_delta(log);
                }
                _ => {}
            }
        }

        self.announce_end();
        self.session
    }

    /// Wait until the queue seals, the timer fires or the battle ends.
    ///
    /// Returns false once every handle is gone.
    async fn await_actions(&mut self) -> bool {
        let timer = tokio::time::sleep(self.turn_timeout);
        tokio::pin!(timer);

        while self.session.phase() == BattlePhase::AwaitingActions {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => return false,
                },
                () = &mut timer => {
                    if let Err(e) = self.session.expire_turn() {
                        warn!(battle_id = %self.session.battle_id(), error = %e, "Turn timer fired out of phase");
                    }
                }
            }
        }
        true
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit {
                player,
                actor_id,
                action,
                reply,
            } => {
                let result = self.session.submit_as(player, actor_id, action);
                if let Err(e) = &result {
                    debug!(
                        battle_id = %self.session.battle_id(),
                        player = %player,
                        actor = %actor_id,
                        error = %e,
                        "Action rejected"
                    );
                }
                if reply.send(result).is_err() {
                    debug!("Submit reply channel closed (caller dropped)");
                }
            }
            SessionCommand::Disconnect { player } => {
                if let Err(e) = self.session.handle_disconnect(player) {
                    debug!(
                        battle_id = %self.session.battle_id(),
                        player = %player,
                        error = %e,
                        "Disconnect ignored"
                    );
                }
            }
            SessionCommand::Reconnect { player, outbox } => self.reconnect(player, outbox),
            SessionCommand::Snapshot { reply } => {
                if reply.send(self.session.delta(Vec::new())).is_err() {
                    debug!("Snapshot reply channel closed (caller dropped)");
                }
            }
        }
    }

    /// Swap in the player's new outbox and bring it up to date
    fn reconnect(&mut self, player: PlayerId, outbox: Outbox) {
        if !self.session.participants().any(|p| p == player) {
            debug!(battle_id = %self.session.battle_id(), player = %player, "Reconnect from non-participant ignored");
            return;
        }

        let frame = ServerFrame::new(
            Some(self.session.battle_id()),
            vec![ServerMessage::BattleStateDelta(Box::new(self.session.delta(Vec::new())))],
        );
        if outbox.send(frame).is_err() {
            debug!(battle_id = %self.session.battle_id(), player = %player, "New outbox already closed");
        }

        match self.outboxes.iter_mut().find(|(p, _)| *p == player) {
            Some((_, current)) => *current = outbox,
            None => self.outboxes.push((player, outbox)),
        }
        debug!(battle_id = %self.session.battle_id(), player = %player, "Player outbox replaced");
    }

    fn resolve(&mut self) {
        match self.session.resolve_turn(&mut self.rng) {
            Ok(report) => {
                debug!(
                    battle_id = %self.session.battle_id(),
                    turn = report.turn,
                    events = report.events.len(),
                    phase = report.phase.as_str(),
                    "Turn resolved"
                );
                self.broadcast_delta(report.events);
            }
            Err(e) => warn!(battle_id = %self.session.battle_id(), error = %e, "Turn resolution refused"),
        }
    }

    fn broadcast_delta(&self, log: Vec<BattleEvent>) {
        let delta = self.session.delta(log);
        self.broadcast(ServerMessage::BattleStateDelta(Box::new(delta)));
    }

    fn announce_end(&self) {
        let Some(result) = BattleResult::from_session(&self.session) else {
            return;
        };
        self.broadcast(ServerMessage::BattleEnded {
            battle_id: result.battle_id,
            outcome: result.outcome,
            winner_id: result.winner_id,
        });
        self.results.record(result);
    }

    fn broadcast(&self, message: ServerMessage) {
        let battle_id = self.session.battle_id();
        let frame = ServerFrame::new(Some(battle_id), vec![message]);
        for (player, outbox) in &self.outboxes {
            if outbox.send(frame.clone()).is_err() {
                debug!(battle_id = %battle_id, player = %player, "Outbox closed, frame dropped");
            }
        }
    }
}
