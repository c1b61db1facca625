//! Running sessions, by battle and by player

use std::collections::HashMap;

use tallgrass_protocol::{BattleId, PlayerId};
use tokio::sync::RwLock;

use crate::session::SessionHandle;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<BattleId, SessionHandle>>,
    players: RwLock<HashMap<PlayerId, BattleId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: SessionHandle, participants: impl IntoIterator<Item = PlayerId>) {
        let battle_id = handle.battle_id();
        self.sessions.write().await.insert(battle_id, handle);
        let mut players = self.players.write().await;
        for player in participants {
            players.insert(player, battle_id);
        }
    }

    pub async fn get(&self, battle_id: BattleId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&battle_id).cloned()
    }

    /// The battle a player is currently in
    pub async fn battle_of(&self, player: PlayerId) -> Option<BattleId> {
        self.players.read().await.get(&player).copied()
    }

    /// Forget a finished session and everyone mapped to it
    pub async fn remove(&self, battle_id: BattleId) -> Option<SessionHandle> {
        let handle = self.sessions.write().await.remove(&battle_id);
        self.players.write().await.retain(|_, id| *id != battle_id);
        handle
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
