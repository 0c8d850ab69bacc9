#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Integration tests use unwrap for brevity

//! Integration tests for the session engine.
//!
//! Two controllers share a chat code; frames one produces are relayed to the
//! other the way the server would, and the resulting events are checked.

use std::sync::{Arc, OnceLock};

use rchat_core::{
    Config, DecryptedMessage, Error, ManualClock, Outbound, SessionController, SessionEvent,
};
use rchat_crypto::{ChatSecrets, CryptoError, derive_session_key, generate_chat_code};
use rchat_proto::{ChatType, ClientMessage, ProtoError, ServerMessage};

/// Derived once per test binary: the memory-hard passes are slow.
fn shared_secrets() -> ChatSecrets {
    static SECRETS: OnceLock<ChatSecrets> = OnceLock::new();
    SECRETS
        .get_or_init(|| ChatSecrets::derive(&generate_chat_code()).unwrap())
        .clone()
}

fn controller(username: &str, clock: &ManualClock) -> SessionController {
    let mut config = Config::default();
    config.client.username = username.into();
    SessionController::with_clock(&config, Arc::new(clock.clone()))
}

/// Alice created the chat, Bob joined it.
fn pair(clock: &ManualClock) -> (SessionController, SessionController) {
    let mut alice = controller("alice", clock);
    let mut bob = controller("bob", clock);
    alice
        .create_with_secrets(shared_secrets(), ChatType::OneToOne)
        .unwrap();
    bob.join_with_secrets(shared_secrets()).unwrap();
    (alice, bob)
}

/// What the server broadcasts for a client's `SendMessage`.
fn relay(sent: &Outbound, timestamp: i64) -> Vec<u8> {
    match ClientMessage::from_bytes(&sent.bytes).unwrap() {
        ClientMessage::SendMessage {
            room_id,
            encrypted_payload,
            message_id,
        } => ServerMessage::MessageReceived {
            room_id,
            encrypted_payload,
            timestamp,
            message_id,
        }
        .to_bytes()
        .unwrap(),
        other => panic!("expected SendMessage, got {other:?}"),
    }
}

fn ack(sent: &Outbound) -> Vec<u8> {
    ServerMessage::MessageAck {
        message_id: sent.message_id.clone(),
    }
    .to_bytes()
    .unwrap()
}

fn expect_message(event: Option<SessionEvent>) -> DecryptedMessage {
    match event {
        Some(SessionEvent::MessageDecrypted(m)) => m,
        other => panic!("expected MessageDecrypted, got {other:?}"),
    }
}

#[test]
fn numeric_code_derives_and_short_code_is_rejected() {
    let key = derive_session_key("123456").unwrap();
    assert_eq!(key.as_bytes().len(), 32);

    // Five digits is not a numeric code; as base64 it is not 64 bytes
    assert!(matches!(
        derive_session_key("12345"),
        Err(CryptoError::InvalidChatCode)
    ));
}

#[test]
fn create_join_send_receive_with_same_code() {
    let code = generate_chat_code();
    let clock = ManualClock::new(1_700_000_000);
    let mut alice = controller("alice", &clock);
    let mut bob = controller("bob", &clock);

    let create = alice.create(&code, ChatType::OneToOne).unwrap();
    let join = bob.join(&code).unwrap();
    assert_eq!(alice.room_id(), bob.room_id());
    assert!(matches!(
        ClientMessage::from_bytes(&create).unwrap(),
        ClientMessage::CreateChat { .. }
    ));
    assert!(matches!(
        ClientMessage::from_bytes(&join).unwrap(),
        ClientMessage::JoinChat { .. }
    ));

    let sent = alice.send("hello").unwrap();
    let msg = expect_message(bob.on_receive(&relay(&sent, 1_700_000_001)));
    assert_eq!(msg.content, "hello");
    assert!(msg.verified);
    assert!(!msg.is_own);
    assert_eq!(msg.username, "alice");
}

#[test]
fn unacked_message_retried_three_times_then_dropped() {
    let clock = ManualClock::new(0);
    let (mut alice, _bob) = pair(&clock);
    let sent = alice.send("are you there?").unwrap();

    clock.set(1);
    assert!(alice.retry_due().resend.is_empty());

    for t in [2, 4, 6] {
        clock.set(t);
        let sweep = alice.retry_due();
        assert_eq!(sweep.resend, vec![sent.clone()], "resend at t={t}");
        assert!(sweep.abandoned.is_empty());
    }

    clock.set(8);
    let sweep = alice.retry_due();
    assert!(sweep.resend.is_empty());
    assert_eq!(sweep.abandoned, vec![sent.message_id.clone()]);
    assert_eq!(alice.pending_count(), 0);

    clock.set(100);
    let sweep = alice.retry_due();
    assert!(sweep.resend.is_empty());
    assert!(sweep.abandoned.is_empty());
}

#[test]
fn acked_message_is_never_retried() {
    let clock = ManualClock::new(0);
    let (mut alice, _bob) = pair(&clock);
    let sent = alice.send("hi").unwrap();

    assert!(matches!(
        alice.on_receive(&ack(&sent)),
        Some(SessionEvent::MessageAck { .. })
    ));
    clock.set(10);
    let sweep = alice.retry_due();
    assert!(sweep.resend.is_empty());
    assert!(sweep.abandoned.is_empty());
}

#[test]
fn two_byte_frame_is_malformed() {
    assert!(matches!(
        ServerMessage::from_bytes(&[3, 0]),
        Err(ProtoError::MalformedWireMessage(_))
    ));

    let clock = ManualClock::new(0);
    let (_alice, mut bob) = pair(&clock);
    assert!(matches!(
        bob.on_receive(&[3, 0]),
        Some(SessionEvent::Error { .. })
    ));
    // Session survives
    assert!(bob.is_active());
}

#[test]
fn out_of_order_delivery_decrypts_everything() {
    let clock = ManualClock::new(0);
    let (mut alice, mut bob) = pair(&clock);
    let sent: Vec<_> = (0..3)
        .map(|i| alice.send(&format!("m{i}")).unwrap())
        .collect();

    let third = expect_message(bob.on_receive(&relay(&sent[2], 0)));
    assert_eq!(third.chain_index, 2);
    assert_eq!(bob.chain_index(), Some(3));

    let first = expect_message(bob.on_receive(&relay(&sent[0], 0)));
    assert_eq!(first.content, "m0");
    assert_eq!(bob.chain_index(), Some(3));

    let second = expect_message(bob.on_receive(&relay(&sent[1], 0)));
    assert_eq!(second.content, "m1");
    assert_eq!(second.sequence_number, 1);
    assert!(second.verified);
    assert_eq!(bob.chain_index(), Some(3));
}

#[test]
fn replay_does_not_regress_ratchet() {
    let clock = ManualClock::new(0);
    let (mut alice, mut bob) = pair(&clock);
    let first = alice.send("one").unwrap();
    let second = alice.send("two").unwrap();

    expect_message(bob.on_receive(&relay(&first, 0)));
    expect_message(bob.on_receive(&relay(&second, 0)));
    assert_eq!(bob.chain_index(), Some(2));

    let replay = expect_message(bob.on_receive(&relay(&first, 0)));
    assert_eq!(replay.content, "one");
    assert_eq!(bob.chain_index(), Some(2));
}

#[test]
fn message_beyond_window_is_dropped_until_gap_closes() {
    let clock = ManualClock::new(0);
    let (mut alice, mut bob) = pair(&clock);
    let sent: Vec<_> = (0..25)
        .map(|i| alice.send(&format!("m{i}")).unwrap())
        .collect();

    // Index 24 is outside [0, 20)
    assert!(bob.on_receive(&relay(&sent[24], 0)).is_none());
    assert_eq!(bob.chain_index(), Some(0));

    let m19 = expect_message(bob.on_receive(&relay(&sent[19], 0)));
    assert_eq!(m19.chain_index, 19);
    assert_eq!(bob.chain_index(), Some(20));

    let m24 = expect_message(bob.on_receive(&relay(&sent[24], 0)));
    assert_eq!(m24.content, "m24");
    assert_eq!(bob.chain_index(), Some(25));

    // Index 10 is now more than five behind
    assert!(bob.on_receive(&relay(&sent[10], 0)).is_none());
}

#[test]
fn both_sides_send_on_shared_chain() {
    let clock = ManualClock::new(0);
    let (mut alice, mut bob) = pair(&clock);

    let hello = alice.send("hello bob").unwrap();
    expect_message(bob.on_receive(&relay(&hello, 0)));

    // Bob's next send continues after the index he just saw
    let reply = bob.send("hello alice").unwrap();
    let msg = expect_message(alice.on_receive(&relay(&reply, 0)));
    assert_eq!(msg.chain_index, 1);
    assert_eq!(msg.username, "bob");
    assert!(msg.verified);
    assert_eq!(msg.sender_fingerprint, Some(bob.fingerprint()));
}

#[test]
fn own_echo_is_marked_own() {
    let clock = ManualClock::new(0);
    let (mut alice, _bob) = pair(&clock);
    let sent = alice.send("echo").unwrap();
    let msg = expect_message(alice.on_receive(&relay(&sent, 0)));
    assert!(msg.is_own);
    assert!(msg.verified);
}

#[test]
fn leave_resets_and_rejoin_starts_fresh() {
    let clock = ManualClock::new(0);
    let (mut alice, mut bob) = pair(&clock);
    let early = alice.send("before leave").unwrap();
    alice.send("pending").unwrap();

    let leave = alice.leave().unwrap();
    assert!(matches!(
        ClientMessage::from_bytes(&leave).unwrap(),
        ClientMessage::LeaveChat { .. }
    ));
    assert!(!alice.is_active());
    assert_eq!(alice.pending_count(), 0);
    assert!(matches!(alice.send("after"), Err(Error::NotInChat)));

    clock.set(50);
    assert!(alice.retry_due().resend.is_empty());

    // Frames for the old chat are ignored while idle
    assert!(alice.on_receive(&relay(&early, 0)).is_none());

    alice.join_with_secrets(shared_secrets()).unwrap();
    assert_eq!(alice.chain_index(), Some(0));
    let again = alice.send("back").unwrap();
    let msg = expect_message(bob.on_receive(&relay(&again, 0)));
    assert_eq!(msg.sequence_number, 0);
    assert_eq!(msg.content, "back");
}
