//! Wire-protocol tests: tagged serialization and message assembly.

use marketsim_rs::prelude::*;

fn biotech_controller(seed: u64) -> ScenarioController {
    ScenarioController::new(ScenarioKind::Biotech, ScenarioConfig::default(), seed)
}

#[test]
fn messages_carry_their_type_tag() {
    let encoded = serde_json::to_string(&Message::LoginRequest {
        username: "ALICE".to_string(),
    })
    .unwrap();
    assert!(encoded.contains("\"type\":\"login_request\""));
    assert!(encoded.contains("\"username\":\"ALICE\""));

    let encoded = serde_json::to_string(&Message::LoginResponse { user_id: 3 }).unwrap();
    assert!(encoded.contains("\"type\":\"login_response\""));

    let encoded = serde_json::to_string(&Message::SimulationUpdate {
        simulation_state: SimulationState::Paused,
        tick: 17,
    })
    .unwrap();
    assert!(encoded.contains("\"type\":\"simulation_update\""));
    assert!(encoded.contains("\"simulation_state\":\"paused\""));
}

#[test]
fn inbound_messages_parse_from_raw_json() {
    let parsed: Message =
        serde_json::from_str(r#"{"type":"login_request","username":"BOB"}"#).unwrap();
    assert!(matches!(parsed, Message::LoginRequest { username } if username == "BOB"));

    let parsed: Message =
        serde_json::from_str(r#"{"type":"chat_message_received","user_id":2,"text":"hi"}"#)
            .unwrap();
    assert!(matches!(parsed, Message::ChatMessageReceived { user_id: 2, .. }));

    assert!(serde_json::from_str::<Message>(r#"{"type":"unknown_thing"}"#).is_err());
}

#[test]
fn load_snapshot_covers_the_whole_kernel_state() {
    let mut controller = biotech_controller(9);
    let alice = controller.register_user("ALICE");

    let load = SimulationLoad::build(&controller, SimulationState::Paused, alice);

    assert_eq!(load.simulation_state, SimulationState::Paused);
    assert_eq!(load.tick, 0);
    assert_eq!(load.max_tick, 1_000);
    assert_eq!(load.all_securities, vec!["CAD", "BIOTECH"]);
    assert_eq!(load.tradeable_securities, load.all_securities);
    assert_eq!(load.security_info["BIOTECH"].decimal_places, 2);
    assert_eq!(load.security_info["BIOTECH"].max_trade_volume, 20);

    // Nothing has run yet: empty books, no history, no news.
    assert!(load.order_book_per_security["BIOTECH"].bids.is_empty());
    assert!(load.transactions["BIOTECH"].is_empty());
    assert!(load.news.is_empty());

    assert_eq!(load.portfolio["CAD"], 0.0);
    assert_eq!(load.portfolio["BIOTECH"], 0.0);
    let usernames: Vec<&str> = load
        .user_id_to_username
        .values()
        .map(String::as_str)
        .collect();
    assert!(usernames.contains(&"AGENT"));
    assert!(usernames.contains(&"ALICE"));
}

#[test]
fn load_snapshot_round_trips_through_json() {
    let mut controller = biotech_controller(9);
    let alice = controller.register_user("ALICE");
    controller.step().unwrap();

    let load = SimulationLoad::build(&controller, SimulationState::Running, alice);
    let encoded = serde_json::to_string(&Message::SimulationLoad(load)).unwrap();
    assert!(encoded.contains("\"type\":\"simulation_load\""));

    let decoded: Message = serde_json::from_str(&encoded).unwrap();
    let Message::SimulationLoad(load) = decoded else {
        panic!("expected a simulation_load message");
    };
    assert_eq!(load.tick, 1);
    assert_eq!(load.order_book_per_security["BIOTECH"].bids.len(), 50);
}

#[test]
fn market_update_reports_the_seeding_tick() {
    let mut controller = biotech_controller(13);
    let alice = controller.register_user("ALICE");

    let step = controller.step().unwrap();
    let update = MarketUpdate::build(&step, controller.kernel(), alice);

    assert_eq!(update.tick, 0);
    let submitted = &update.submitted_orders["BIOTECH"];
    assert_eq!(submitted.bid.len(), 50);
    assert_eq!(submitted.ask.len(), 50);
    assert!(update.submitted_orders["CAD"].bid.is_empty());
    assert!(update.cancelled_orders["BIOTECH"].is_empty());

    // Prices cross the wire in currency units, near the initial price.
    assert!(
        submitted
            .bid
            .iter()
            .all(|order| order.price > 50.0 && order.price < 150.0)
    );
    assert_eq!(update.portfolio.len(), 2);
    assert!(update.new_news.is_empty());
}

#[test]
fn market_update_includes_cancellations_and_fills_later_on() {
    let mut controller = biotech_controller(13);
    let alice = controller.register_user("ALICE");

    controller.step().unwrap();
    let step = controller.step().unwrap();
    let update = MarketUpdate::build(&step, controller.kernel(), alice);

    assert_eq!(update.tick, 1);
    // Ten agent orders were pruned from the hundred seeded ones.
    assert_eq!(update.cancelled_orders["BIOTECH"].len(), 10);
    let submitted = &update.submitted_orders["BIOTECH"];
    assert_eq!(submitted.bid.len() + submitted.ask.len(), 10);
}
