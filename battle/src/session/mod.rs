//! Authoritative battle session state machine
//!
//! ```text
//! intro ──► awaiting_actions ──► resolving ──► awaiting_actions ...
//!   │              │                  │
//!   ▼              ▼                  ▼
//! aborted   victory|defeat|fled   victory|defeat|fled|captured
//! ```
//!
//! A session only changes through its own methods. The caller (one actor
//! per session on the server) is the single writer.

mod queue;
mod side;

pub use queue::{declared_priority, sort_queue, QueuedAction};
pub use side::BattleSide;

use rand::Rng;
use tallgrass_protocol::{
    BattleAction, BattleEvent, BattleId, BattleKind, BattleOutcome, BattlePhase, BattleStateDelta,
    CombatId, CombatantSummary, PlayerId,
};
use tracing::{debug, info, warn};

use crate::error::{ActionError, SessionError};
use crate::policy::ActionPolicy;
use crate::resolver::{Ending, TurnResolver};
use crate::types::{BattleCombatant, Weather};

/// Result of an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Waiting for the other side
    Queued,
    /// Every side has acted, the session is now resolving
    Sealed,
}

/// Everything one resolved turn produced
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub turn: u32,
    pub events: Vec<BattleEvent>,
    /// Phase after resolution
    pub phase: BattlePhase,
}

/// One battle, from creation to outcome
#[derive(Debug, Clone)]
pub struct BattleSession {
    battle_id: BattleId,
    kind: BattleKind,
    /// Seed of the RNG driving resolution; same seed and inputs, same battle
    seed: u64,
    turn_number: u32,
    phase: BattlePhase,
    pub(crate) sides: [BattleSide; 2],
    action_queue: Vec<QueuedAction>,
    pub(crate) weather: Option<Weather>,
    pub(crate) weather_turns_remaining: u8,
    winner_id: Option<PlayerId>,
    outcome: Option<BattleOutcome>,
    battle_log: Vec<BattleEvent>,
    /// Events raised between turns (timeouts, forfeits), sent with the next delta
    pending_log: Vec<BattleEvent>,
}

impl BattleSession {
    /// Create a session in `intro`. Side 0 belongs to whoever started it.
    pub fn new(battle_id: BattleId, kind: BattleKind, seed: u64, sides: [BattleSide; 2]) -> Self {
        Self {
            battle_id,
            kind,
            seed,
            turn_number: 0,
            phase: BattlePhase::Intro,
            sides,
            action_queue: Vec::new(),
            weather: None,
            weather_turns_remaining: 0,
            winner_id: None,
            outcome: None,
            battle_log: Vec::new(),
            pending_log: Vec::new(),
        }
    }

    /// A wild battle between a player's party and one wild combatant
    pub fn wild(
        battle_id: BattleId,
        seed: u64,
        player: PlayerId,
        party: Vec<BattleCombatant>,
        wild: BattleCombatant,
    ) -> Option<Self> {
        let mut party = party.into_iter();
        let lead = party.next()?;
        let player_side = BattleSide::new(Some(player), lead, party.collect());
        Some(Self::new(battle_id, BattleKind::Wild, seed, [player_side, BattleSide::wild(wild)]))
    }

    /// Start with some weather already active
    pub fn with_weather(mut self, weather: Weather, turns: u8) -> Self {
        self.weather = Some(weather);
        self.weather_turns_remaining = turns.max(1);
        self
    }

    pub fn battle_id(&self) -> BattleId {
        self.battle_id
    }

    pub fn kind(&self) -> BattleKind {
        self.kind
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn winner_id(&self) -> Option<PlayerId> {
        self.winner_id
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    pub fn weather(&self) -> Option<Weather> {
        self.weather
    }

    pub fn weather_turns_remaining(&self) -> u8 {
        self.weather_turns_remaining
    }

    pub fn side(&self, index: u8) -> Option<&BattleSide> {
        self.sides.get(index as usize)
    }

    pub fn sides(&self) -> &[BattleSide; 2] {
        &self.sides
    }

    pub fn battle_log(&self) -> &[BattleEvent] {
        &self.battle_log
    }

    pub fn queued_actions(&self) -> &[QueuedAction] {
        &self.action_queue
    }

    /// Players taking part, in side order
    pub fn participants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.sides.iter().filter_map(|s| s.owner)
    }

    /// Side controlled by a player
    pub fn side_of_player(&self, player: PlayerId) -> Option<u8> {
        self.sides
            .iter()
            .position(|s| s.owner == Some(player))
            .map(|i| i as u8)
    }

    /// Side whose active combatant has this id
    pub fn side_of_active(&self, actor: CombatId) -> Option<u8> {
        self.sides
            .iter()
            .position(|s| s.active.combat_id == actor)
            .map(|i| i as u8)
    }

    fn transition(&mut self, next: BattlePhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(
            battle_id = %self.battle_id,
            from = self.phase.as_str(),
            to = next.as_str(),
            "Battle phase transition"
        );
        self.phase = next;
        Ok(())
    }

    /// Leave `intro` once both combatants are in place
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.transition(BattlePhase::AwaitingActions)?;
        self.turn_number = 1;
        info!(battle_id = %self.battle_id, kind = self.kind.as_str(), "Battle started");
        Ok(())
    }

    /// Queue an action for an active combatant
    pub fn submit(&mut self, actor_id: CombatId, action: BattleAction) -> Result<SubmitOutcome, ActionError> {
        if self.phase != BattlePhase::AwaitingActions {
            return Err(ActionError::NotAccepting(self.phase));
        }

        let side = self
            .side_of_active(actor_id)
            .ok_or(ActionError::UnknownActor(actor_id))?;
        let actor = &self.sides[side as usize].active;

        if actor.is_fainted() {
            return Err(ActionError::ActorFainted(actor_id));
        }
        if self.action_queue.iter().any(|q| q.side == side) {
            return Err(ActionError::AlreadySubmitted(actor_id));
        }

        let action = self.validate(side, action)?;
        let queued = QueuedAction::new(action, &self.sides[side as usize].active, side);
        self.action_queue.push(queued);

        if self.action_queue.len() == self.sides.len() {
            self.seal();
            Ok(SubmitOutcome::Sealed)
        } else {
            Ok(SubmitOutcome::Queued)
        }
    }

    /// [`submit`](Self::submit) on behalf of a player, who must own the actor
    pub fn submit_as(
        &mut self,
        player: PlayerId,
        actor_id: CombatId,
        action: BattleAction,
    ) -> Result<SubmitOutcome, ActionError> {
        let owns = self
            .side_of_active(actor_id)
            .is_some_and(|side| self.sides[side as usize].owner == Some(player));
        if !owns && self.phase == BattlePhase::AwaitingActions {
            return Err(ActionError::NotOwner {
                player,
                actor: actor_id,
            });
        }
        self.submit(actor_id, action)
    }

    fn validate(&self, side: u8, action: BattleAction) -> Result<BattleAction, ActionError> {
        let own = &self.sides[side as usize];
        match &action {
            BattleAction::Attack { move_id } => {
                if !own.active.has_usable_move() {
                    return Ok(BattleAction::Struggle);
                }
                let known = own
                    .active
                    .find_move(move_id)
                    .ok_or_else(|| ActionError::UnknownMove(move_id.clone()))?;
                if !known.is_usable() {
                    return Err(ActionError::NoPp(move_id.clone()));
                }
            }
            BattleAction::Item { item } => {
                if item.is_ball() && (self.kind != BattleKind::Wild || side != 0) {
                    return Err(ActionError::ItemNotAllowed { item: *item });
                }
            }
            BattleAction::Switch { slot } => {
                if !own.can_switch_to(*slot) {
                    return Err(ActionError::InvalidSwitch(*slot));
                }
            }
            BattleAction::Flee => {
                if self.kind == BattleKind::Trainer {
                    return Err(ActionError::CannotFlee);
                }
            }
            BattleAction::Struggle => {
                if own.active.has_usable_move() {
                    return Err(ActionError::StruggleNotAllowed);
                }
            }
        }
        Ok(action)
    }

    /// Let the policy pick for every NPC side that has not acted yet
    pub fn choose_npc_actions<P: ActionPolicy + ?Sized>(&mut self, policy: &P) -> SubmitOutcome {
        let mut outcome = SubmitOutcome::Queued;
        for index in 0..self.sides.len() {
            let side = index as u8;
            if !self.sides[index].is_npc() || self.action_queue.iter().any(|q| q.side == side) {
                continue;
            }
            if self.phase != BattlePhase::AwaitingActions {
                break;
            }

            let own = &self.sides[index];
            let opponent = &self.sides[1 - index];
            let action = policy.choose(own, opponent, self.kind);
            let actor_id = own.active.combat_id;

            outcome = match self.submit(actor_id, action) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        battle_id = %self.battle_id,
                        actor = %actor_id,
                        error = %e,
                        "NPC action rejected, struggling instead"
                    );
                    self.force_action(side, BattleAction::Struggle)
                }
            };
        }
        outcome
    }

    /// Queue without validation; used for defaults the session itself picks
    fn force_action(&mut self, side: u8, action: BattleAction) -> SubmitOutcome {
        let queued = QueuedAction::new(action, &self.sides[side as usize].active, side);
        self.action_queue.push(queued);
        if self.action_queue.len() == self.sides.len() {
            self.seal();
            SubmitOutcome::Sealed
        } else {
            SubmitOutcome::Queued
        }
    }

    fn seal(&mut self) {
        // Only reached from awaiting_actions, so this transition is always legal
        if self.transition(BattlePhase::Resolving).is_ok() {
            for queued in &mut self.action_queue {
                queued.effective_speed = self.sides[queued.side as usize].active.effective_speed();
            }
            debug!(battle_id = %self.battle_id, turn = self.turn_number, "Action queue sealed");
        }
    }

    /// The turn timer fired: default every missing action and seal.
    ///
    /// Wild battles make a silent player flee; everyone else struggles.
    /// Returns the actors that were defaulted.
    pub fn expire_turn(&mut self) -> Result<Vec<CombatId>, SessionError> {
        if self.phase != BattlePhase::AwaitingActions {
            return Err(SessionError::NotAwaiting(self.phase));
        }

        let mut defaulted = Vec::new();
        for index in 0..self.sides.len() {
            let side = index as u8;
            if self.action_queue.iter().any(|q| q.side == side) {
                continue;
            }

            let own = &self.sides[index];
            let action = if self.kind == BattleKind::Wild && !own.is_npc() {
                BattleAction::Flee
            } else {
                BattleAction::Struggle
            };
            let actor = own.active.combat_id;

            warn!(
                battle_id = %self.battle_id,
                actor = %actor,
                substituted = action.kind().as_str(),
                "Turn timer expired, substituting default action"
            );
            self.pending_log.push(BattleEvent::Timeout {
                actor,
                substituted: action.kind(),
            });
            defaulted.push(actor);
            self.force_action(side, action);
        }

        Ok(defaulted)
    }

    /// Run the turn resolver once for the sealed queue.
    ///
    /// Only legal in `resolving`; the phase changes before this returns, so a
    /// second call for the same turn is refused.
    pub fn resolve_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TurnReport, SessionError> {
        if self.phase != BattlePhase::Resolving {
            return Err(SessionError::NotResolving(self.phase));
        }

        let turn = self.turn_number;
        let queue = std::mem::take(&mut self.action_queue);
        let mut events = vec![BattleEvent::Turn { turn }];
        events.append(&mut self.pending_log);

        let ending = TurnResolver::new(self, rng).resolve(queue, &mut events);

        match ending {
            Some(ending) => self.finish(ending)?,
            None => {
                self.transition(BattlePhase::AwaitingActions)?;
                self.turn_number += 1;
            }
        }

        self.battle_log.extend(events.iter().cloned());
        Ok(TurnReport {
            turn,
            events,
            phase: self.phase,
        })
    }

    fn finish(&mut self, ending: Ending) -> Result<(), SessionError> {
        let (outcome, winner) = match ending {
            Ending::Fled => (BattleOutcome::Fled, None),
            Ending::Captured => (BattleOutcome::Captured, self.sides[0].owner),
            Ending::Defeated { loser: 0 } => (BattleOutcome::Defeat, self.sides[1].owner),
            Ending::Defeated { .. } => (BattleOutcome::Victory, self.sides[0].owner),
        };

        self.transition(outcome.phase())?;
        self.outcome = Some(outcome);
        self.winner_id = winner;
        self.action_queue.clear();

        info!(
            battle_id = %self.battle_id,
            outcome = outcome.as_str(),
            winner = ?winner,
            turns = self.turn_number,
            "Battle ended"
        );
        Ok(())
    }

    /// Cancel a battle that never left `intro`
    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.transition(BattlePhase::Aborted)?;
        self.outcome = Some(BattleOutcome::Aborted);
        info!(battle_id = %self.battle_id, "Battle aborted");
        Ok(())
    }

    /// A side gives up: wild battles count it as fleeing, otherwise the
    /// other side wins
    pub fn forfeit(&mut self, side: u8) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::Ended);
        }
        let ending = if self.kind == BattleKind::Wild {
            Ending::Fled
        } else {
            Ending::Defeated { loser: side.min(1) }
        };
        self.pending_log.push(BattleEvent::Forfeit { side });
        self.finish(ending)
    }

    /// A participant dropped: abort during intro, forfeit afterwards
    pub fn handle_disconnect(&mut self, player: PlayerId) -> Result<(), SessionError> {
        let side = self
            .side_of_player(player)
            .ok_or(SessionError::UnknownPlayer(player))?;

        match self.phase {
            BattlePhase::Intro => self.abort(),
            phase if phase.is_terminal() => Err(SessionError::Ended),
            _ => self.forfeit(side),
        }
    }

    /// Events not yet sent (forfeit/timeout raised outside a resolution)
    pub fn take_pending_log(&mut self) -> Vec<BattleEvent> {
        let events = std::mem::take(&mut self.pending_log);
        self.battle_log.extend(events.iter().cloned());
        events
    }

    /// Every combatant, side 0 first
    pub fn summary(&self) -> Vec<CombatantSummary> {
        self.sides
            .iter()
            .enumerate()
            .flat_map(|(i, side)| side.summaries(i as u8))
            .collect()
    }

    /// Wire snapshot of the current state carrying `log`
    pub fn delta(&self, log: Vec<BattleEvent>) -> BattleStateDelta {
        BattleStateDelta {
            battle_id: self.battle_id,
            turn_number: self.turn_number,
            phase: self.phase,
            combatants: self.summary(),
            weather: self.weather.map(|w| w.to_protocol().to_string()),
            log,
        }
    }
}
