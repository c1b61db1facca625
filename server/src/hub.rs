//! Routes client commands to the authority and the session actors

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tallgrass_encounter::EncounterProposal;
use tallgrass_protocol::{
    BattleAction, BattleId, ClientCommand, CombatId, PlayerId, ServerFrame, ServerMessage, TriggerEncounter,
};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::authority::{BattleResultSink, EncounterAuthority};
use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::session::{Outbox, SessionActor};
use crate::spawn::SpawnTable;
use crate::world::{starter_party, FixedConditions, InMemoryDirectory, LogResults};

/// Shared state behind every connection
pub struct Hub {
    authority: Mutex<EncounterAuthority>,
    registry: Arc<SessionRegistry>,
    outboxes: RwLock<HashMap<PlayerId, Outbox>>,
    results: Arc<dyn BattleResultSink>,
    turn_timeout: Duration,
    inbox_capacity: usize,
    started: Instant,
}

impl Hub {
    pub fn new(authority: EncounterAuthority, results: Arc<dyn BattleResultSink>, config: &ServerConfig) -> Self {
        Self {
            authority: Mutex::new(authority),
            registry: Arc::new(SessionRegistry::new()),
            outboxes: RwLock::new(HashMap::new()),
            results,
            turn_timeout: config.turn_timeout,
            inbox_capacity: config.inbox_capacity,
            started: Instant::now(),
        }
    }

    /// Wire up the in-process directory, spawner and conditions.
    ///
    /// A spawn table that fails to load falls back to the built-in one.
    pub fn from_config(config: &ServerConfig) -> Self {
        let spawner = match &config.spawn_table {
            Some(path) => SpawnTable::from_file(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Spawn table failed to load, using built-in table");
                SpawnTable::default()
            }),
            None => SpawnTable::default(),
        };
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(seed, "Encounter authority seeded");

        let authority = EncounterAuthority::new(
            Arc::new(InMemoryDirectory::new().with_fallback_party(starter_party())),
            Arc::new(spawner),
            Arc::new(FixedConditions::default()),
            config.cooldown_ms,
            seed,
        )
        .with_map_dir(config.map_dir.clone());

        Self::new(authority, Arc::new(LogResults), config)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Server clock for gate decisions
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// A connection identified itself as `player`.
    ///
    /// A running battle of theirs is pointed at the new connection.
    pub async fn connect(&self, player: PlayerId, outbox: Outbox) {
        let replaced = self
            .outboxes
            .write()
            .await
            .insert(player, outbox.clone())
            .is_some();
        info!(player = %player, replaced, "Player connected");

        if let Some(battle_id) = self.registry.battle_of(player).await
            && let Some(handle) = self.registry.get(battle_id).await
            && let Err(e) = handle.reconnect(player, outbox).await
        {
            debug!(player = %player, battle_id = %battle_id, error = %e, "Battle already gone");
        }
    }

    /// A connection closed. Ignored if the player already reconnected on
    /// another socket.
    pub async fn disconnect(&self, player: PlayerId, outbox: &Outbox) {
        {
            let mut outboxes = self.outboxes.write().await;
            if !outboxes.get(&player).is_some_and(|current| current.same_channel(outbox)) {
                debug!(player = %player, "Stale connection closed");
                return;
            }
            outboxes.remove(&player);
        }

        self.authority.lock().await.forget(player);

        if let Some(battle_id) = self.registry.battle_of(player).await
            && let Some(handle) = self.registry.get(battle_id).await
            && let Err(e) = handle.disconnect(player).await
        {
            debug!(player = %player, battle_id = %battle_id, error = %e, "Battle already gone");
        }
        info!(player = %player, "Player disconnected");
    }

    /// Handle one command from an identified player
    pub async fn handle(&self, player: PlayerId, command: ClientCommand) {
        match command {
            // Identification is the connection's job
            ClientCommand::Hello(_) => {}
            ClientCommand::EnterZone(zone_id) => {
                let now = self.now_ms();
                self.authority.lock().await.enter_zone(player, &zone_id, now);
            }
            ClientCommand::TriggerEncounter(trigger) => self.propose(player, &trigger).await,
            ClientCommand::SubmitBattleAction {
                battle_id,
                actor_id,
                action,
            } => self.submit(player, battle_id, actor_id, action).await,
        }
    }

    async fn propose(&self, player: PlayerId, trigger: &TriggerEncounter) {
        let proposal = EncounterProposal::from_trigger(player, trigger);

        // Held until the session is registered, so a second proposal sees it
        let mut authority = self.authority.lock().await;
        let in_battle = self.registry.battle_of(player).await.is_some();

        let accepted = match authority.handle_proposal(&proposal, self.now_ms(), in_battle) {
            Ok(accepted) => accepted,
            Err(reason) => {
                self.send_to(player, ServerFrame::new(None, vec![ServerMessage::EncounterFailed(reason)]))
                    .await;
                return;
            }
        };

        let battle_id = accepted.session.battle_id();
        self.send_to(
            player,
            ServerFrame::new(
                Some(battle_id),
                vec![ServerMessage::WildEncounter {
                    battle_id,
                    success: true,
                    combatant: accepted.wild,
                }],
            ),
        )
        .await;

        // Held until the session is registered, so a reconnect either lands
        // in this snapshot or finds the session
        let current = self.outboxes.read().await;
        let participants: Vec<PlayerId> = accepted.session.participants().collect();
        let outboxes = participants
            .iter()
            .filter_map(|p| current.get(p).map(|outbox| (*p, outbox.clone())))
            .collect();

        let (actor, handle) = SessionActor::new(
            accepted.session,
            outboxes,
            Arc::clone(&self.results),
            self.turn_timeout,
            self.inbox_capacity,
        );
        self.registry.insert(handle, participants).await;
        drop(current);
        drop(authority);

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let session = actor.run().await;
            registry.remove(session.battle_id()).await;
            debug!(battle_id = %session.battle_id(), "Session actor finished");
        });
    }

    async fn submit(&self, player: PlayerId, battle_id: BattleId, actor_id: CombatId, action: BattleAction) {
        let Some(handle) = self.registry.get(battle_id).await else {
            self.reject(player, battle_id, format!("battle {} is not running", battle_id))
                .await;
            return;
        };

        if let Err(e) = handle.submit(player, actor_id, action).await {
            self.reject(player, battle_id, e.to_string()).await;
        }
    }

    async fn reject(&self, player: PlayerId, battle_id: BattleId, message: String) {
        let message = ServerMessage::ActionRejected { battle_id, message };
        self.send_to(player, ServerFrame::new(Some(battle_id), vec![message]))
            .await;
    }

    async fn send_to(&self, player: PlayerId, frame: ServerFrame) {
        let outboxes = self.outboxes.read().await;
        match outboxes.get(&player) {
            Some(outbox) if outbox.send(frame).is_ok() => {}
            _ => debug!(player = %player, "No open connection, frame dropped"),
        }
    }
}
