#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        parse_server_frame, parse_server_message, BattleEvent, BattleId, BattleOutcome,
        BattlePhase, BattleStateDelta, CombatId, CombatantSummary, EncounterFailReason, PlayerId,
        ServerFrame, ServerMessage,
    };

    fn summary() -> CombatantSummary {
        CombatantSummary {
            combat_id: CombatId(2),
            side: 1,
            species_id: 16,
            level: 3,
            current_hp: 14,
            max_hp: 14,
            types: vec!["normal".to_string(), "flying".to_string()],
            status: None,
            stages: BTreeMap::new(),
        }
    }

    #[test]
    fn test_parse_wild_encounter() {
        let msg = ServerMessage::WildEncounter {
            battle_id: BattleId(9),
            success: true,
            combatant: summary(),
        };
        let line = msg.to_protocol_string();
        assert!(line.starts_with("|wildencounter|9|true|{"));

        assert_eq!(parse_server_message(&line).unwrap(), msg);
    }

    #[test]
    fn test_parse_encounter_failed() {
        let message = parse_server_message("|encounterfailed|rate_miss").unwrap();
        assert_eq!(
            message,
            ServerMessage::EncounterFailed(EncounterFailReason::RateMiss)
        );
    }

    #[test]
    fn test_parse_encounter_failed_invalid() {
        assert!(parse_server_message("|encounterfailed|").is_err());
        assert!(parse_server_message("|encounterfailed|bad_luck").is_err());
    }

    #[test]
    fn test_parse_battle_state_with_pipe_in_payload() {
        let delta = BattleStateDelta {
            battle_id: BattleId(4),
            turn_number: 2,
            phase: BattlePhase::AwaitingActions,
            combatants: vec![summary()],
            weather: Some("rain".to_string()),
            log: vec![BattleEvent::ActionDropped {
                actor: CombatId(1),
                reason: "unknown move a|b".to_string(),
            }],
        };
        let line = ServerMessage::BattleStateDelta(Box::new(delta.clone())).to_protocol_string();

        match parse_server_message(&line).unwrap() {
            ServerMessage::BattleStateDelta(parsed) => assert_eq!(*parsed, delta),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_parse_battle_end() {
        let message = parse_server_message("|battleend|4|victory|12").unwrap();
        assert_eq!(
            message,
            ServerMessage::BattleEnded {
                battle_id: BattleId(4),
                outcome: BattleOutcome::Victory,
                winner_id: Some(PlayerId(12)),
            }
        );

        let message = parse_server_message("|battleend|4|defeat|").unwrap();
        assert_eq!(
            message,
            ServerMessage::BattleEnded {
                battle_id: BattleId(4),
                outcome: BattleOutcome::Defeat,
                winner_id: None,
            }
        );
    }

    #[test]
    fn test_parse_frame_with_header() {
        let frame = ServerFrame::new(
            Some(BattleId(5)),
            vec![
                ServerMessage::ActionRejected {
                    battle_id: BattleId(5),
                    message: "already submitted".to_string(),
                },
                ServerMessage::BattleEnded {
                    battle_id: BattleId(5),
                    outcome: BattleOutcome::Fled,
                    winner_id: None,
                },
            ],
        );
        let wire = frame.to_wire_format();
        assert!(wire.starts_with(">battle-5\n"));

        assert_eq!(parse_server_frame(&wire).unwrap(), frame);
    }

    #[test]
    fn test_parse_frame_bad_header() {
        assert!(parse_server_frame(">lobby\n|encounterfailed|cooldown").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let line = "|someunknown|data";
        let message = parse_server_message(line).unwrap();

        assert_eq!(message, ServerMessage::Raw("|someunknown|data".to_string()));
    }

    #[test]
    fn test_parse_empty() {
        let line = "";
        let message = parse_server_message(line).unwrap();

        assert_eq!(message, ServerMessage::Raw("".to_string()));
    }
}
