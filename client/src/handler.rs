use async_trait::async_trait;
use tallgrass_protocol::{
    BattleId, BattleOutcome, BattleStateDelta, CombatantSummary, EncounterFailReason, PlayerId,
};

/// Trait for handling server messages.
///
/// Implement this trait to react to encounters and battle updates. All
/// methods have default no-op implementations, so you only need to
/// implement the events you care about.
///
/// # Example
///
/// ```ignore
/// struct AutoBattler {
///     sender: Sender,
///     actor: Option<CombatId>,
/// }
///
/// #[async_trait]
/// impl Handler for AutoBattler {
///     async fn on_battle_state_delta(&mut self, delta: &BattleStateDelta) {
///         if delta.phase == BattlePhase::AwaitingActions {
///             self.sender.submit_action(delta.battle_id, my_actor, action).await.ok();
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send {
    /// The server accepted (or refused) an encounter proposal and created
    /// a battle against `combatant`.
    async fn on_wild_encounter(&mut self, battle_id: BattleId, success: bool, combatant: &CombatantSummary) {
        let _ = (battle_id, success, combatant);
    }

    /// The server rejected an encounter proposal.
    async fn on_encounter_failed(&mut self, reason: EncounterFailReason) {
        let _ = reason;
    }

    /// A newer state for a battle. Stale or duplicate deltas never reach
    /// the handler.
    async fn on_battle_state_delta(&mut self, delta: &BattleStateDelta) {
        let _ = delta;
    }

    /// A battle ended.
    async fn on_battle_ended(&mut self, battle_id: BattleId, outcome: BattleOutcome, winner: Option<PlayerId>) {
        let _ = (battle_id, outcome, winner);
    }

    /// An action this client submitted was refused.
    async fn on_action_rejected(&mut self, battle_id: BattleId, message: &str) {
        let _ = (battle_id, message);
    }

    /// Called for any message not handled by a specific method.
    /// The battle parameter is Some if the frame carried a battle header.
    async fn on_raw(&mut self, battle: Option<BattleId>, content: &str) {
        let _ = (battle, content);
    }
}
