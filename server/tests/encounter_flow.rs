use std::sync::{Arc, Mutex};
use std::time::Duration;

use tallgrass_battle::{BaseStats, BattleCombatant, KnownMove, MoveCategory, Type};
use tallgrass_encounter::{EncounterIndex, IndexOptions, MapData, RateTable};
use tallgrass_protocol::{
    parse_server_frame, BattleAction, BattleEvent, BattleId, BattleOutcome, BattlePhase, BattleStateDelta,
    ClientCommand, CombatId, EncounterFailReason, EncounterMethod, PlayerId, ServerFrame, ServerMessage,
    TriggerEncounter,
};
use tallgrass_server::{
    BattleResult, BattleResultSink, EncounterAuthority, FixedConditions, Hub, InMemoryDirectory, ServerConfig,
    SpawnTable,
};
use tokio::sync::mpsc;

const PLAYER: PlayerId = PlayerId(1);

const MAP: &str = r#"{
    "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
    "layers": [
        {"type": "tilelayer", "name": "ground", "width": 2, "height": 1, "data": [1, 1]},
        {"type": "objectgroup", "name": "zones", "objects": [
            {"id": 1, "x": 0, "y": 0, "width": 32, "height": 16,
             "properties": [{"name": "zoneKey", "value": "route1-grass"}]}
        ]}
    ],
    "tilesets": [{"firstgid": 1, "tiles": [
        {"id": 0, "properties": [{"name": "grass", "value": true}]}
    ]}]
}"#;

const SPAWNS: &str = r#"{
    "entries": [{
        "method": "grass",
        "species_id": 10,
        "min_level": 2,
        "max_level": 2,
        "types": ["bug"],
        "base_stats": {"hp": 20, "attack": 20, "defense": 20,
                       "special_attack": 20, "special_defense": 20, "speed": 20},
        "moves": [{"id": "tackle", "move_type": "normal", "category": "physical",
                   "power": 40, "accuracy": 0, "pp": 35, "max_pp": 35}]
    }]
}"#;

#[derive(Default)]
struct Recorded(Mutex<Vec<BattleResult>>);

impl BattleResultSink for Recorded {
    fn record(&self, result: BattleResult) {
        self.0.lock().unwrap().push(result);
    }
}

fn champion() -> BattleCombatant {
    BattleCombatant::new(
        CombatId(0),
        150,
        100,
        vec![Type::Psychic],
        BaseStats::new(106, 110, 90, 154, 90, 130),
        vec![KnownMove::attack("mega_punch", Type::Normal, MoveCategory::Physical, 250, 0, 5)],
    )
}

fn hub(results: Arc<Recorded>) -> Hub {
    let directory = InMemoryDirectory::new();
    directory.register(PLAYER, vec![champion(), champion()]);

    let rates = RateTable {
        grass_rate: 1.0,
        ceiling: 1.0,
        rules: Vec::new(),
        ..RateTable::default()
    };
    let mut authority = EncounterAuthority::new(
        Arc::new(directory),
        Arc::new(SpawnTable::from_json(SPAWNS).unwrap()),
        Arc::new(FixedConditions::default()),
        1_000,
        5,
    )
    .with_rates(rates);
    let map = MapData::from_json(MAP).unwrap();
    authority.insert_zone("route1", EncounterIndex::load(&map, &IndexOptions::default()));

    Hub::new(authority, results, &ServerConfig::default())
}

fn trigger() -> ClientCommand {
    ClientCommand::TriggerEncounter(TriggerEncounter {
        x: 8.0,
        y: 8.0,
        zone_key: "route1-grass".to_string(),
        method: EncounterMethod::Grass,
        rate: 0.1,
        timestamp: 0,
    })
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ServerFrame>) -> ServerMessage {
    let frame = rx.recv().await.expect("outbox closed");
    frame.messages.into_iter().next().expect("empty frame")
}

fn delta(message: ServerMessage) -> BattleStateDelta {
    match message {
        ServerMessage::BattleStateDelta(delta) => *delta,
        other => panic!("expected battle state, got {:?}", other),
    }
}

/// Connect, enter the zone and get a battle accepted
async fn start_battle(hub: &Hub) -> mpsc::UnboundedReceiver<ServerFrame> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(PLAYER, tx).await;
    hub.handle(PLAYER, ClientCommand::EnterZone("route1".to_string())).await;
    tokio::time::advance(Duration::from_millis(1_000)).await;

    hub.handle(PLAYER, trigger()).await;
    match next(&mut rx).await {
        ServerMessage::WildEncounter {
            battle_id, success, ..
        } => {
            assert!(success);
            assert_eq!(battle_id, BattleId(1));
        }
        other => panic!("expected wild encounter, got {:?}", other),
    }

    let opening = delta(next(&mut rx).await);
    assert_eq!(opening.phase, BattlePhase::AwaitingActions);
    assert_eq!(opening.turn_number, 1);
    rx
}

async fn wait_until_unregistered(hub: &Hub) {
    for _ in 0..100 {
        if hub.registry().battle_of(PLAYER).await.is_none() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("session never left the registry");
}

#[tokio::test]
async fn test_proposal_to_victory() {
    tokio::time::pause();
    let results = Arc::new(Recorded::default());
    let hub = hub(results.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(PLAYER, tx).await;
    hub.handle(PLAYER, ClientCommand::EnterZone("route1".to_string())).await;

    // Entering the zone starts the cooldown
    hub.handle(PLAYER, trigger()).await;
    assert_eq!(
        next(&mut rx).await,
        ServerMessage::EncounterFailed(EncounterFailReason::Cooldown)
    );

    tokio::time::advance(Duration::from_millis(1_000)).await;
    hub.handle(PLAYER, trigger()).await;

    let frame = rx.recv().await.unwrap();
    assert_eq!(parse_server_frame(&frame.to_wire_format()).unwrap(), frame);
    let ServerMessage::WildEncounter { battle_id, combatant, .. } = &frame.messages[0] else {
        panic!("expected wild encounter, got {:?}", frame.messages);
    };
    assert_eq!(*battle_id, BattleId(1));
    assert_eq!(combatant.species_id, 10);
    assert_eq!(combatant.combat_id, CombatId(3));

    let opening = delta(next(&mut rx).await);
    assert_eq!(opening.combatants.len(), 3);

    // Already battling
    tokio::time::advance(Duration::from_millis(1_000)).await;
    hub.handle(PLAYER, trigger()).await;
    assert_eq!(
        next(&mut rx).await,
        ServerMessage::EncounterFailed(EncounterFailReason::InBattle)
    );

    hub.handle(
        PLAYER,
        ClientCommand::SubmitBattleAction {
            battle_id: BattleId(1),
            actor_id: CombatId(1),
            action: BattleAction::Attack {
                move_id: "mega_punch".to_string(),
            },
        },
    )
    .await;

    let resolved = delta(next(&mut rx).await);
    assert_eq!(resolved.phase, BattlePhase::Victory);
    assert!(resolved.log.contains(&BattleEvent::Faint { target: CombatId(3) }));

    assert_eq!(
        next(&mut rx).await,
        ServerMessage::BattleEnded {
            battle_id: BattleId(1),
            outcome: BattleOutcome::Victory,
            winner_id: Some(PLAYER),
        }
    );

    wait_until_unregistered(&hub).await;
    assert!(hub.registry().is_empty().await);
    assert_eq!(results.0.lock().unwrap()[0].outcome, BattleOutcome::Victory);
}

#[tokio::test]
async fn test_turn_timer_flees_wild_battle() {
    tokio::time::pause();
    let hub = hub(Arc::new(Recorded::default()));
    let mut rx = start_battle(&hub).await;

    // Nobody acts; the paused clock jumps to the turn timer
    let resolved = delta(next(&mut rx).await);
    assert_eq!(resolved.phase, BattlePhase::Fled);
    assert!(resolved
        .log
        .iter()
        .any(|e| matches!(e, BattleEvent::Timeout { actor, .. } if *actor == CombatId(1))));

    assert!(matches!(
        next(&mut rx).await,
        ServerMessage::BattleEnded {
            outcome: BattleOutcome::Fled,
            winner_id: None,
            ..
        }
    ));
    wait_until_unregistered(&hub).await;
}

#[tokio::test]
async fn test_rejected_actions_reach_only_the_submitter() {
    tokio::time::pause();
    let hub = hub(Arc::new(Recorded::default()));
    let mut rx = start_battle(&hub).await;

    hub.handle(
        PLAYER,
        ClientCommand::SubmitBattleAction {
            battle_id: BattleId(1),
            actor_id: CombatId(3),
            action: BattleAction::Flee,
        },
    )
    .await;
    match next(&mut rx).await {
        ServerMessage::ActionRejected { battle_id, message } => {
            assert_eq!(battle_id, BattleId(1));
            assert!(message.contains("does not control"), "{}", message);
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    hub.handle(
        PLAYER,
        ClientCommand::SubmitBattleAction {
            battle_id: BattleId(42),
            actor_id: CombatId(1),
            action: BattleAction::Flee,
        },
    )
    .await;
    assert!(matches!(
        next(&mut rx).await,
        ServerMessage::ActionRejected {
            battle_id: BattleId(42),
            ..
        }
    ));

    // The battle itself is untouched
    let handle = hub.registry().get(BattleId(1)).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, BattlePhase::AwaitingActions);
    assert_eq!(snapshot.turn_number, 1);
}

#[tokio::test]
async fn test_disconnect_forfeits_running_battle() {
    tokio::time::pause();
    let hub = hub(Arc::new(Recorded::default()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(PLAYER, tx.clone()).await;
    hub.handle(PLAYER, ClientCommand::EnterZone("route1".to_string())).await;
    tokio::time::advance(Duration::from_millis(1_000)).await;
    hub.handle(PLAYER, trigger()).await;
    assert!(matches!(next(&mut rx).await, ServerMessage::WildEncounter { .. }));
    delta(next(&mut rx).await);

    hub.disconnect(PLAYER, &tx).await;

    let last = delta(next(&mut rx).await);
    assert_eq!(last.phase, BattlePhase::Fled);
    assert_eq!(last.log, vec![BattleEvent::Forfeit { side: 0 }]);
    assert!(matches!(
        next(&mut rx).await,
        ServerMessage::BattleEnded {
            outcome: BattleOutcome::Fled,
            ..
        }
    ));
    wait_until_unregistered(&hub).await;

    // Forgotten by the authority too: no zone until the player enters one again
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(PLAYER, tx).await;
    hub.handle(PLAYER, trigger()).await;
    assert_eq!(
        next(&mut rx).await,
        ServerMessage::EncounterFailed(EncounterFailReason::NoZone)
    );
}

#[tokio::test]
async fn test_reconnect_mid_battle_moves_the_stream() {
    tokio::time::pause();
    let hub = hub(Arc::new(Recorded::default()));
    let mut old_rx = start_battle(&hub).await;

    // The new socket says hello before the old one is closed
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(PLAYER, tx).await;

    let resumed = delta(next(&mut rx).await);
    assert_eq!(resumed.phase, BattlePhase::AwaitingActions);
    assert_eq!(resumed.turn_number, 1);
    assert!(resumed.log.is_empty());

    hub.handle(
        PLAYER,
        ClientCommand::SubmitBattleAction {
            battle_id: BattleId(1),
            actor_id: CombatId(1),
            action: BattleAction::Attack {
                move_id: "mega_punch".to_string(),
            },
        },
    )
    .await;

    assert_eq!(delta(next(&mut rx).await).phase, BattlePhase::Victory);
    assert!(matches!(
        next(&mut rx).await,
        ServerMessage::BattleEnded {
            outcome: BattleOutcome::Victory,
            ..
        }
    ));
    wait_until_unregistered(&hub).await;
    assert!(old_rx.try_recv().is_err());
}
