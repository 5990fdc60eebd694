use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;

use uplink_protocol::message::CommandMessage;
use uplink_protocol::testing::FakeRadio;
use uplink_protocol::{ACK, HmacAuthenticator, OSCAR_PASSWORD, PacketManager};

use super::*;
use crate::nvm::MemoryNvm;

const SECRET: &str = "shared_secret_key";
const NAME: &str = "Orbit1";
const TIMEOUT: Duration = Duration::from_millis(10);

fn handler_with_counter(start: u16) -> (CommandDataHandler<FakeRadio, MemoryNvm>, FakeRadio) {
    let radio = FakeRadio::new(252);
    let packets = PacketManager::new(radio.clone(), "KK7ABC", Duration::ZERO).unwrap();
    let mut replay_counter = Counter16::new(MemoryNvm::new(4), 0).unwrap();
    replay_counter.set(start).unwrap();

    let config = Config {
        cubesat_name: NAME.into(),
        hmac_secret: SECRET.into(),
        license: "KK7ABC".into(),
        jokes: vec!["Why did the satellite break up with the moon? It needed space.".into()],
        modulation: "LoRa".into(),
        max_frame_size: 252,
        turnaround_delay_ms: 0,
        listen_timeout_s: 1,
        path: PathBuf::new(),
    };
    (CommandDataHandler::new(config, packets, replay_counter), radio)
}

fn handler() -> (CommandDataHandler<FakeRadio, MemoryNvm>, FakeRadio) {
    handler_with_counter(0)
}

fn signed_as(name: &str, command: &str, args: Option<Vec<&str>>, counter: u16) -> Vec<u8> {
    let auth = HmacAuthenticator::new(SECRET);
    let mut msg = CommandMessage::new();
    msg.insert("name", name);
    msg.insert("command", command);
    if let Some(args) = args {
        msg.insert("args", args);
    }
    msg.sign(&auth, counter);
    msg.to_bytes()
}

fn signed(command: &str, args: Option<Vec<&str>>, counter: u16) -> Vec<u8> {
    signed_as(NAME, command, args, counter)
}

fn oscar(command: &str, args: Option<Vec<&str>>) -> Vec<u8> {
    let mut msg = CommandMessage::new();
    msg.insert("password", OSCAR_PASSWORD);
    msg.insert("command", command);
    if let Some(args) = args {
        msg.insert("args", args);
    }
    msg.to_bytes()
}

fn texts(radio: &FakeRadio) -> Vec<String> {
    radio
        .sent_payloads()
        .into_iter()
        .map(|p| String::from_utf8_lossy(&p).into_owned())
        .collect()
}

// ---------------------------- pass outcomes ---------------------------------

#[tokio::test]
async fn timeout_with_nothing_received_is_a_silent_noop() {
    let (mut cdh, radio) = handler();
    assert_eq!(cdh.listen_for_commands(TIMEOUT).await, PassOutcome::Idle);
    assert!(radio.sent().is_empty());
}

#[tokio::test]
async fn unparsable_payload_gets_a_diagnostic() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(b"definitely not json");

    assert_eq!(cdh.listen_for_commands(TIMEOUT).await, PassOutcome::Diagnostic);
    let sent = texts(&radio);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("failed to parse command message"));
}

// ------------------------------ hmac path -----------------------------------

#[tokio::test]
async fn authenticated_command_is_acknowledged_and_dispatched() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&signed(CMD_SEND_JOKE, None, 1));

    let outcome = cdh.listen_for_commands(TIMEOUT).await;
    assert_eq!(outcome, PassOutcome::Dispatched(Dispatched::SendJoke));
    assert_eq!(cdh.last_accepted_counter(), 1);

    let sent = radio.sent_payloads();
    assert_eq!(sent[0], ACK);
    assert!(String::from_utf8_lossy(&sent[1]).contains("satellite"));
}

#[tokio::test]
async fn replaying_an_accepted_message_is_rejected() {
    let (mut cdh, radio) = handler();
    let wire = signed(CMD_SEND_JOKE, None, 1);

    radio.queue_payload(&wire);
    assert!(matches!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(_)
    ));
    let frames_after_first = radio.sent().len();

    radio.queue_payload(&wire);
    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::Replay)
    );
    // silent: not a single frame left the radio
    assert_eq!(radio.sent().len(), frames_after_first);
}

#[tokio::test]
async fn missing_hmac_or_counter_is_silently_dropped() {
    let (mut cdh, radio) = handler();

    radio.queue_payload(br#"{"name":"Orbit1","command":"reset","counter":1}"#);
    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::MissingAuth)
    );

    radio.queue_payload(br#"{"name":"Orbit1","command":"reset","hmac":"00"}"#);
    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::MissingAuth)
    );

    assert!(radio.sent().is_empty());
    assert_eq!(cdh.last_accepted_counter(), 0);
}

#[tokio::test]
async fn out_of_range_counter_is_rejected_before_hmac() {
    let (mut cdh, radio) = handler();
    // the digest is garbage, yet the drop reason is the counter: the range
    // check runs first and no acknowledgement is ever sent
    radio.queue_payload(
        br#"{"name":"Orbit1","command":"reset","counter":70000,"hmac":"00ff"}"#,
    );
    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::InvalidCounterField)
    );
    assert!(radio.sent().is_empty());
}

#[tokio::test]
async fn tampered_command_fails_verification() {
    let (mut cdh, radio) = handler();

    let auth = HmacAuthenticator::new(SECRET);
    let mut msg = CommandMessage::new();
    msg.insert("name", NAME);
    msg.insert("command", CMD_SEND_JOKE);
    msg.sign(&auth, 2);
    // flip the command after signing, keep the original digest
    msg.insert("command", CMD_RESET);
    radio.queue_payload(&msg.to_bytes());

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::BadHmac)
    );
    assert!(radio.sent().is_empty());
}

#[tokio::test]
async fn forward_wraparound_is_accepted() {
    let (mut cdh, radio) = handler_with_counter(65530);
    radio.queue_payload(&signed(CMD_SEND_JOKE, None, 5));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::SendJoke)
    );
    assert_eq!(cdh.last_accepted_counter(), 5);
}

#[tokio::test]
async fn backward_jump_is_stale() {
    let (mut cdh, radio) = handler_with_counter(5);
    radio.queue_payload(&signed(CMD_SEND_JOKE, None, 65530));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::Replay)
    );
    assert_eq!(cdh.last_accepted_counter(), 5);
    assert!(radio.sent().is_empty());
}

#[tokio::test]
async fn name_mismatch_drops_after_the_counter_is_persisted() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&signed_as("SomeOtherSat", CMD_SEND_JOKE, None, 9));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dropped(DropReason::NameMismatch)
    );
    // authentication succeeded, so the window is closed for this value
    assert_eq!(cdh.last_accepted_counter(), 9);
    assert!(radio.sent().is_empty());
}

#[tokio::test]
async fn unknown_command_is_acknowledged_then_reported() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&signed("dance", None, 1));

    assert_eq!(cdh.listen_for_commands(TIMEOUT).await, PassOutcome::Diagnostic);
    let sent = texts(&radio);
    assert_eq!(sent[0].as_bytes(), ACK);
    assert_eq!(sent[1], "unknown command received: dance");
}

#[tokio::test]
async fn modulation_change_updates_config() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&signed(CMD_CHANGE_RADIO_MODULATION, Some(vec!["FSK"]), 1));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::ChangeRadioModulation)
    );
    assert_eq!(cdh.config.modulation, "FSK");
    assert!(texts(&radio)[1].contains("radio modulation changed: FSK"));
}

#[tokio::test]
async fn bad_modulation_is_reported_to_the_authenticated_sender() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&signed(CMD_CHANGE_RADIO_MODULATION, Some(vec!["QAM4096"]), 1));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::ChangeRadioModulation)
    );
    assert_eq!(cdh.config.modulation, "LoRa");
    assert!(texts(&radio)[1].starts_with("failed to change radio modulation"));
}

// --------------------------- counter query path -----------------------------

#[tokio::test]
async fn counter_query_answers_without_authentication() {
    let (mut cdh, radio) = handler_with_counter(1234);
    radio.queue_payload(br#"{"command":"get_counter"}"#);

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::GetCounter)
    );
    assert_eq!(texts(&radio), vec!["1234".to_string()]);
    // read-only: the floor did not move
    assert_eq!(cdh.last_accepted_counter(), 1234);
}

// ------------------------------ legacy path ---------------------------------

#[tokio::test]
async fn oscar_ping_answers_with_rssi_and_never_touches_the_counter() {
    let (mut cdh, radio) = handler_with_counter(42);
    radio.queue_payload(&oscar(CMD_PING, None));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::Oscar)
    );
    let sent = texts(&radio);
    assert_eq!(sent[0].as_bytes(), ACK);
    assert_eq!(sent[1], "Pong! -70");
    assert_eq!(cdh.last_accepted_counter(), 42);
}

#[tokio::test]
async fn oscar_repeat_echoes_the_joined_args() {
    let (mut cdh, radio) = handler_with_counter(42);
    radio.queue_payload(&oscar(CMD_REPEAT, Some(vec!["hello", "from", "the", "ground"])));

    assert_eq!(
        cdh.listen_for_commands(TIMEOUT).await,
        PassOutcome::Dispatched(Dispatched::Oscar)
    );
    assert_eq!(texts(&radio)[1], "hello from the ground");
    assert_eq!(cdh.last_accepted_counter(), 42);
}

#[tokio::test]
async fn oscar_repeat_without_args_is_a_diagnostic() {
    let (mut cdh, radio) = handler();
    radio.queue_payload(&oscar(CMD_REPEAT, None));

    assert_eq!(cdh.listen_for_commands(TIMEOUT).await, PassOutcome::Diagnostic);
    assert_eq!(texts(&radio)[1], "no message specified for repeat command");
}

// ----------------------------- replay window --------------------------------

#[test]
fn replay_window_edge_vectors() {
    assert!(counter_is_fresh(65530, 5)); // diff = 11
    assert!(!counter_is_fresh(5, 65530)); // diff = 65525
    assert!(!counter_is_fresh(7, 7)); // exact replay
    assert!(counter_is_fresh(0, 32768)); // edge of the forward window
    assert!(!counter_is_fresh(0, 32769)); // one past it
}

proptest! {
    /// The predicate accepts exactly the counters reachable by 1..=32768
    /// forward steps from the floor.
    #[test]
    fn freshness_matches_the_forward_step_model(last: u16, steps in 0u32..65536) {
        let candidate = last.wrapping_add(steps as u16);
        prop_assert_eq!(
            counter_is_fresh(last, candidate),
            steps >= 1 && steps <= 32768
        );
    }
}
