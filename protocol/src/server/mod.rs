mod battle;
mod battle_log;
mod tests;

pub use battle::{
    BattleId, BattleKind, BattleOutcome, BattlePhase, BattleStateDelta, CombatId,
    CombatantSummary, EncounterFailReason, EncounterMethod, PlayerId, Stat,
};
pub use battle_log::BattleEvent;

use crate::ParseError;
use anyhow::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// |wildencounter|BATTLEID|SUCCESS|COMBATANT
    WildEncounter {
        battle_id: BattleId,
        success: bool,
        combatant: CombatantSummary,
    },

    /// |encounterfailed|REASON
    EncounterFailed(EncounterFailReason),

    /// |battlestate|DELTA
    BattleStateDelta(Box<BattleStateDelta>),

    /// |battleend|BATTLEID|OUTCOME|WINNER
    BattleEnded {
        battle_id: BattleId,
        outcome: BattleOutcome,
        winner_id: Option<PlayerId>,
    },

    /// |actionrejected|BATTLEID|MESSAGE
    ActionRejected { battle_id: BattleId, message: String },

    Raw(String),
}

impl ServerMessage {
    /// Serialize to a single protocol line
    pub fn to_protocol_string(&self) -> String {
        match self {
            Self::WildEncounter {
                battle_id,
                success,
                combatant,
            } => format!(
                "|wildencounter|{}|{}|{}",
                battle_id,
                success,
                to_json(combatant)
            ),
            Self::EncounterFailed(reason) => format!("|encounterfailed|{}", reason.as_str()),
            Self::BattleStateDelta(delta) => format!("|battlestate|{}", to_json(delta)),
            Self::BattleEnded {
                battle_id,
                outcome,
                winner_id,
            } => format!(
                "|battleend|{}|{}|{}",
                battle_id,
                outcome.as_str(),
                winner_id.map(|w| w.to_string()).unwrap_or_default()
            ),
            Self::ActionRejected { battle_id, message } => {
                format!("|actionrejected|{}|{}", battle_id, message)
            }
            Self::Raw(line) => line.clone(),
        }
    }
}

// Summaries and deltas only hold plain data, serialization cannot fail
fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerFrame {
    pub battle_id: Option<BattleId>,
    pub messages: Vec<ServerMessage>,
}

impl ServerFrame {
    pub fn new(battle_id: Option<BattleId>, messages: Vec<ServerMessage>) -> Self {
        Self {
            battle_id,
            messages,
        }
    }

    /// Serialize to wire format: an optional >battle-ID line, then one line per message
    pub fn to_wire_format(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len() + 1);
        if let Some(id) = self.battle_id {
            lines.push(format!(">battle-{}", id));
        }
        lines.extend(self.messages.iter().map(ServerMessage::to_protocol_string));
        lines.join("\n")
    }
}

/// Parse a complete WebSocket frame into structured messages
pub fn parse_server_frame(frame: &str) -> Result<ServerFrame> {
    let mut lines = frame.lines();
    let mut battle_id = None;

    // Check if first line is >battle-ID
    if let Some(first_line) = lines.clone().next()
        && let Some(header) = first_line.strip_prefix('>')
    {
        let id = header
            .strip_prefix("battle-")
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| ParseError::InvalidFormat(format!("bad frame header '{}'", header)))?;
        battle_id = Some(id);
        lines.next();
    }

    // Parse remaining lines as messages
    let messages: Vec<ServerMessage> = lines
        .filter(|line| !line.trim().is_empty())
        .map(parse_server_message)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(ServerFrame {
        battle_id,
        messages,
    })
}

/// Parse a single line from the server into a ServerMessage
pub fn parse_server_message(line: &str) -> Result<ServerMessage> {
    let line = line.trim();

    if line.is_empty() {
        return Ok(ServerMessage::Raw(String::new()));
    }

    if !line.starts_with('|') {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    let parts: Vec<&str> = line.split('|').collect();

    if parts.len() < 2 {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    match parts[1] {
        "wildencounter" => parse_wild_encounter(&parts),
        "encounterfailed" => parse_encounter_failed(&parts),
        "battlestate" => parse_battle_state(&parts),
        "battleend" => parse_battle_end(&parts),
        "actionrejected" => parse_action_rejected(&parts),
        _ => Ok(ServerMessage::Raw(line.to_string())),
    }
}

fn parse_wild_encounter(parts: &[&str]) -> Result<ServerMessage> {
    // |wildencounter|BATTLEID|SUCCESS|JSON, the JSON may contain '|'
    if parts.len() < 5 {
        return Err(ParseError::MissingField("wild encounter combatant".to_string()).into());
    }

    let battle_id = parse_battle_id(parts[2])?;
    let success = parts[3]
        .parse()
        .map_err(|_| ParseError::InvalidFormat(format!("invalid success flag '{}'", parts[3])))?;
    let combatant = serde_json::from_str(&parts[4..].join("|"))?;

    Ok(ServerMessage::WildEncounter {
        battle_id,
        success,
        combatant,
    })
}

fn parse_encounter_failed(parts: &[&str]) -> Result<ServerMessage> {
    let reason_str = parts
        .get(2)
        .ok_or_else(|| ParseError::MissingField("failure reason".to_string()))?;
    let reason = EncounterFailReason::parse(reason_str)
        .ok_or_else(|| ParseError::InvalidFormat(format!("unknown reason '{}'", reason_str)))?;

    Ok(ServerMessage::EncounterFailed(reason))
}

fn parse_battle_state(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("battle state".to_string()).into());
    }

    let delta: BattleStateDelta = serde_json::from_str(&parts[2..].join("|"))?;
    Ok(ServerMessage::BattleStateDelta(Box::new(delta)))
}

fn parse_battle_end(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 4 {
        return Err(ParseError::MissingField("battle outcome".to_string()).into());
    }

    let battle_id = parse_battle_id(parts[2])?;
    let outcome = BattleOutcome::parse(parts[3])
        .ok_or_else(|| ParseError::InvalidFormat(format!("unknown outcome '{}'", parts[3])))?;
    let winner_id = match parts.get(4) {
        Some(w) if !w.is_empty() => Some(
            w.parse()
                .map_err(|_| ParseError::InvalidFormat(format!("invalid winner '{}'", w)))?,
        ),
        _ => None,
    };

    Ok(ServerMessage::BattleEnded {
        battle_id,
        outcome,
        winner_id,
    })
}

fn parse_action_rejected(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("battle id".to_string()).into());
    }

    let battle_id = parse_battle_id(parts[2])?;
    let message = parts.get(3..).map(|p| p.join("|")).unwrap_or_default();

    Ok(ServerMessage::ActionRejected { battle_id, message })
}

fn parse_battle_id(s: &str) -> Result<BattleId> {
    s.parse()
        .map_err(|_| ParseError::InvalidFormat(format!("invalid battle id '{}'", s)).into())
}
