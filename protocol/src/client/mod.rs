use anyhow::Result;

use crate::action::BattleAction;
use crate::server::{BattleId, CombatId, EncounterMethod, PlayerId};
use crate::ParseError;

/// An encounter proposal as it travels over the wire.
///
/// The player is implied by the connection it arrives on.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEncounter {
    pub x: f32,
    pub y: f32,
    pub zone_key: String,
    pub method: EncounterMethod,
    /// Rate the client evaluated locally (advisory only)
    pub rate: f64,
    /// Client clock in milliseconds
    pub timestamp: u64,
}

/// Commands that clients can send to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// |hello|PLAYERID
    Hello(PlayerId),

    /// |zone|ZONEID
    EnterZone(String),

    /// |trigger|X|Y|ZONEKEY|METHOD|RATE|TIMESTAMP
    TriggerEncounter(TriggerEncounter),

    /// |choose|BATTLEID|ACTORID|KIND|PAYLOAD
    SubmitBattleAction {
        battle_id: BattleId,
        actor_id: CombatId,
        action: BattleAction,
    },
}

impl ClientCommand {
    /// Serialize command to protocol format
    pub fn to_protocol_string(&self) -> String {
        match self {
            Self::Hello(player) => format!("|hello|{}", player),
            Self::EnterZone(zone) => format!("|zone|{}", zone),
            Self::TriggerEncounter(t) => format!(
                "|trigger|{}|{}|{}|{}|{}|{}",
                t.x,
                t.y,
                t.zone_key,
                t.method.as_str(),
                t.rate,
                t.timestamp
            ),
            Self::SubmitBattleAction {
                battle_id,
                actor_id,
                action,
            } => {
                let (kind, payload) = action.to_wire();
                format!("|choose|{}|{}|{}|{}", battle_id, actor_id, kind, payload)
            }
        }
    }
}

/// Parse a single line sent by a client
pub fn parse_client_command(line: &str) -> Result<ClientCommand> {
    let line = line.trim();

    if line.is_empty() {
        return Err(ParseError::EmptyMessage.into());
    }

    let parts: Vec<&str> = line.split('|').collect();
    if !line.starts_with('|') || parts.len() < 2 {
        return Err(ParseError::InvalidFormat(line.to_string()).into());
    }

    match parts[1] {
        "hello" => {
            let player = field(&parts, 2, "player id")?;
            Ok(ClientCommand::Hello(parse_number(player, "player id")?))
        }
        "zone" => {
            let zone = field(&parts, 2, "zone id")?;
            Ok(ClientCommand::EnterZone(zone.to_string()))
        }
        "trigger" => parse_trigger(&parts),
        "choose" => parse_choose(&parts),
        other => Err(ParseError::InvalidFormat(format!("unknown command '{}'", other)).into()),
    }
}

fn parse_trigger(parts: &[&str]) -> Result<ClientCommand> {
    let x = parse_number(field(parts, 2, "x")?, "x")?;
    let y = parse_number(field(parts, 3, "y")?, "y")?;
    let zone_key = field(parts, 4, "zone key")?.to_string();
    let method_str = field(parts, 5, "method")?;
    let method = EncounterMethod::parse(method_str)
        .ok_or_else(|| ParseError::InvalidFormat(format!("unknown method '{}'", method_str)))?;
    let rate: f64 = parse_number(field(parts, 6, "rate")?, "rate")?;
    let timestamp = parse_number(field(parts, 7, "timestamp")?, "timestamp")?;

    if !rate.is_finite() {
        return Err(ParseError::InvalidFormat("rate must be finite".to_string()).into());
    }

    Ok(ClientCommand::TriggerEncounter(TriggerEncounter {
        x,
        y,
        zone_key,
        method,
        rate,
        timestamp,
    }))
}

fn parse_choose(parts: &[&str]) -> Result<ClientCommand> {
    let battle_id = parse_number(field(parts, 2, "battle id")?, "battle id")?;
    let actor_id = parse_number(field(parts, 3, "actor id")?, "actor id")?;
    let kind = field(parts, 4, "action kind")?;
    // The JSON payload may itself contain '|'
    let payload = parts.get(5..).map(|p| p.join("|")).unwrap_or_default();
    let action = BattleAction::from_wire(kind, &payload)?;

    Ok(ClientCommand::SubmitBattleAction {
        battle_id,
        actor_id,
        action,
    })
}

fn field<'a>(parts: &[&'a str], index: usize, name: &str) -> Result<&'a str> {
    match parts.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ParseError::MissingField(name.to_string()).into()),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ParseError::InvalidFormat(format!("invalid {}: '{}'", name, value)).into())
}
