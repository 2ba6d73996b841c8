//! End-to-end scenarios through the gateway core
//!
//! Each test drives real envelopes through the dispatcher and hub, with the
//! relay and directory replaced by in-memory fakes that reuse the relay's
//! validation code.

use integration_tests::fakes::InMemoryRelay;
use integration_tests::fixtures::*;
use ripple_proto::rpc::Role;
use ripple_proto::{Cid, Event, EventBody, EventKind};
use std::sync::Arc;

const DIRECT: &str = "d:alice:bob";

fn direct_cid() -> Cid {
    Cid::parse(DIRECT).unwrap()
}

/// Seed `count` text events from `sender` straight into the fake relay
async fn seed_events(relay: &Arc<InMemoryRelay>, cid: &Cid, sender: &str, count: usize) {
    use ripple_client::RelayApi;
    for i in 0..count {
        relay
            .store_event(&Event::text(cid.clone(), sender, format!("seed {i}")))
            .await
            .unwrap();
    }
}

async fn direct_pair(bed: &TestBed) {
    bed.directory.add_member(DIRECT, "alice");
    bed.directory.add_member(DIRECT, "bob");
}

#[tokio::test]
async fn test_text_fanout() {
    let bed = TestBed::new();
    direct_pair(&bed).await;
    bed.relay.set_now(1_700_000_000);

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;

    bed.dispatch(&alpha, &subscribe(1, DIRECT)).await;
    assert_eq!(expect_ack(&mut alpha_rx).await.seq, 1);
    bed.dispatch(&beta, &subscribe(2, DIRECT)).await;
    assert_eq!(expect_ack(&mut beta_rx).await.seq, 2);

    bed.dispatch(&alpha, &event_request(7, &Event::text(direct_cid(), "alice", "hi")))
        .await;

    // Sender sees the push (it subscribed) and the ack; order between the
    // two is whatever the hub and dispatcher produced, so collect both.
    let ack = loop {
        let envelope = recv_envelope(&mut alpha_rx).await;
        if envelope.cmd == ripple_proto::Command::Ack {
            break ripple_proto::AckBody::from_value(&envelope.body).unwrap();
        }
    };
    assert_eq!(ack.seq, 7);
    assert_eq!(ack.mid, 1);

    let event = expect_event_push(&mut beta_rx).await;
    assert_eq!(event.mid, 1);
    assert_eq!(event.timestamp, 1_700_000_000);
    assert_eq!(event.sender, "alice");
    assert_eq!(event.kind(), Some(EventKind::Text));
    assert_eq!(
        event.body,
        EventBody::Text {
            content: "hi".to_string()
        }
    );
}

#[tokio::test]
async fn test_revoke_within_window() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    // Alice's mid=5 was sent at T=0; she revokes at T=60.
    bed.relay.set_now(0);
    seed_events(&bed.relay, &direct_cid(), "alice", 5).await;
    bed.relay.set_now(60);

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    bed.dispatch(
        &alpha,
        &event_request(9, &Event::revoke(direct_cid(), "alice", 5, 0, "")),
    )
    .await;

    let ack = expect_ack(&mut alpha_rx).await;
    assert_eq!(ack.seq, 9);
    assert_eq!(ack.mid, 6);

    let push = expect_event_push(&mut beta_rx).await;
    assert_eq!(push.kind(), Some(EventKind::Revoke));
    assert_eq!(push.target_mid(), Some(5));
}

#[tokio::test]
async fn test_revoke_outside_window() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    bed.relay.set_now(0);
    seed_events(&bed.relay, &direct_cid(), "alice", 5).await;
    bed.relay.set_now(200);

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    bed.dispatch(
        &alpha,
        &event_request(9, &Event::revoke(direct_cid(), "alice", 5, 0, "")),
    )
    .await;

    let error = expect_error(&mut alpha_rx).await;
    assert_eq!(error.code, 5003);
    assert_eq!(error.message, "revoke window exceeded");
    assert_eq!(error.seq, 9);

    // No mid 6: the revoke was never persisted, nothing fanned out.
    assert_eq!(bed.relay.event_count(), 5);
    expect_silence(&mut beta_rx).await;
}

#[tokio::test]
async fn test_admin_revokes_outside_window() {
    let bed = TestBed::new();
    bed.directory.add_member("g:team", "alice");
    bed.directory
        .add_member_with_role("g:team", "mod", Role::Admin);

    let cid = Cid::parse("g:team").unwrap();
    bed.relay.set_now(0);
    seed_events(&bed.relay, &cid, "alice", 1).await;
    bed.relay.set_now(10_000);

    let (admin, mut admin_rx) = bed.connect("mod").await;
    bed.dispatch(&admin, &event_request(3, &Event::revoke(cid, "mod", 1, 0, "moderated")))
        .await;

    let ack = expect_ack(&mut admin_rx).await;
    assert_eq!(ack.mid, 2);
}

#[tokio::test]
async fn test_edit_rules() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    bed.relay.set_now(0);
    seed_events(&bed.relay, &direct_cid(), "alice", 2).await;
    bed.relay.set_now(100);

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;

    // Bob cannot edit Alice's message.
    bed.dispatch(
        &beta,
        &event_request(4, &Event::edit(direct_cid(), "bob", 1, "hijacked", 1)),
    )
    .await;
    let error = expect_error(&mut beta_rx).await;
    assert_eq!(error.code, 5004);
    assert_eq!(error.message, "not your message");

    // Alice can, inside the window.
    bed.dispatch(
        &alpha,
        &event_request(5, &Event::edit(direct_cid(), "alice", 1, "fixed", 1)),
    )
    .await;
    let ack = expect_ack(&mut alpha_rx).await;
    assert_eq!(ack.mid, 3);
}

#[tokio::test]
async fn test_muted_user() {
    let bed = TestBed::new();
    direct_pair(&bed).await;
    bed.directory.set_muted(DIRECT, "bob", true);

    let (beta, mut beta_rx) = bed.connect("bob").await;

    // A muted user's text is rejected...
    bed.dispatch(&beta, &event_request(3, &Event::text(direct_cid(), "bob", "hello?")))
        .await;
    let error = expect_error(&mut beta_rx).await;
    assert_eq!(error.code, 1003);
    assert_eq!(error.message, "you are muted");
    assert_eq!(bed.relay.event_count(), 0);

    // ...but their read receipt still lands.
    bed.dispatch(
        &beta,
        &event_request(4, &Event::read_receipt(direct_cid(), "bob", 17)),
    )
    .await;
    let ack = expect_ack(&mut beta_rx).await;
    assert_eq!(ack.seq, 4);
    assert_eq!(ack.mid, 0);
    assert_eq!(bed.relay.receipt(DIRECT, "bob"), Some(17));
}

#[tokio::test]
async fn test_subscribe_without_access() {
    let bed = TestBed::new();
    let (carol, mut carol_rx) = bed.connect("carol").await;

    bed.dispatch(&carol, &subscribe(1, "g:team")).await;

    let error = expect_error(&mut carol_rx).await;
    assert_eq!(error.code, 4002);
    assert_eq!(bed.hub.subscriber_count("g:team"), 0);
}

#[tokio::test]
async fn test_unsubscribe_needs_no_authorization() {
    let bed = TestBed::new();
    let (carol, mut carol_rx) = bed.connect("carol").await;

    // Never a member, never subscribed; stop-receiving is still an ack.
    bed.dispatch(&carol, &unsubscribe(2, "g:team")).await;
    let ack = expect_ack(&mut carol_rx).await;
    assert_eq!(ack.seq, 2);
}

#[tokio::test]
async fn test_ordering_of_one_hundred_events() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    for i in 0..100 {
        bed.dispatch(
            &alpha,
            &event_request(i + 1, &Event::text(direct_cid(), "alice", format!("m{i}"))),
        )
        .await;
    }

    // Acks arrive in request order with contiguous mids.
    for i in 0..100 {
        let ack = expect_ack(&mut alpha_rx).await;
        assert_eq!(ack.seq, i + 1);
        assert_eq!(ack.mid, i + 1);
    }

    // The subscriber observes the events in mid order.
    for i in 0..100 {
        let event = expect_event_push(&mut beta_rx).await;
        assert_eq!(event.mid, i + 1);
    }
}

#[tokio::test]
async fn test_sender_identity_is_overwritten() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    // The client claims to be someone else.
    let spoofed = Event::text(direct_cid(), "mallory", "hi");
    bed.dispatch(&alpha, &event_request(2, &spoofed)).await;
    expect_ack(&mut alpha_rx).await;

    let event = expect_event_push(&mut beta_rx).await;
    assert_eq!(event.sender, "alice");
}

#[tokio::test]
async fn test_typing_is_not_persisted() {
    let bed = TestBed::new();
    direct_pair(&bed).await;

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    bed.dispatch(&alpha, &event_request(2, &Event::typing(direct_cid(), "alice", 1)))
        .await;

    let ack = expect_ack(&mut alpha_rx).await;
    assert_eq!(ack.mid, 0);
    assert_eq!(bed.relay.event_count(), 0);

    let push = expect_event_push(&mut beta_rx).await;
    assert_eq!(push.kind(), Some(EventKind::Typing));
    assert_eq!(push.mid, 0);
}

#[tokio::test]
async fn test_store_failure_reaches_no_subscriber() {
    let bed = TestBed::new();
    direct_pair(&bed).await;
    bed.relay.fail_next_stores(true);

    let (alpha, mut alpha_rx) = bed.connect("alice").await;
    let (beta, mut beta_rx) = bed.connect("bob").await;
    bed.dispatch(&beta, &subscribe(1, DIRECT)).await;
    expect_ack(&mut beta_rx).await;

    bed.dispatch(&alpha, &event_request(2, &Event::text(direct_cid(), "alice", "hi")))
        .await;

    let error = expect_error(&mut alpha_rx).await;
    assert_eq!(error.code, 1005);
    expect_silence(&mut beta_rx).await;
}

#[tokio::test]
async fn test_ping_pong() {
    let bed = TestBed::new();
    let (conn, mut rx) = bed.connect("alice").await;

    bed.dispatch(&conn, &ripple_proto::Envelope::new(ripple_proto::Command::Ping, 11, rmpv::Value::Nil))
        .await;

    let envelope = recv_envelope(&mut rx).await;
    assert_eq!(envelope.cmd, ripple_proto::Command::Pong);
    assert_eq!(envelope.seq, 11);
}

#[tokio::test]
async fn test_unknown_command() {
    let bed = TestBed::new();
    let (conn, mut rx) = bed.connect("alice").await;

    bed.dispatch(
        &conn,
        &ripple_proto::Envelope::new(
            ripple_proto::Command::Unknown("search".to_string()),
            5,
            rmpv::Value::Nil,
        ),
    )
    .await;

    let error = expect_error(&mut rx).await;
    assert_eq!(error.code, 1001);
    assert_eq!(error.seq, 5);
}

#[tokio::test]
async fn test_undecodable_frame() {
    let bed = TestBed::new();
    let (conn, mut rx) = bed.connect("alice").await;

    bed.dispatcher.handle_frame(&conn, &[0xc3]).await;

    let error = expect_error(&mut rx).await;
    assert_eq!(error.code, 1001);
    assert_eq!(error.seq, 0);
}

#[tokio::test]
async fn test_sync_tail_and_incremental() {
    let bed = TestBed::new();
    direct_pair(&bed).await;
    bed.relay.set_now(1000);
    seed_events(&bed.relay, &direct_cid(), "alice", 10).await;

    let (beta, mut beta_rx) = bed.connect("bob").await;

    // Tail fetch: last three events.
    let tail = ripple_proto::SyncBody {
        cid: DIRECT.to_string(),
        last_mid: 0,
        limit: 3,
        before: 0,
        after: 0,
    };
    bed.dispatch(
        &beta,
        &ripple_proto::Envelope::new(ripple_proto::Command::Sync, 21, tail.to_value()),
    )
    .await;

    let reply = recv_envelope(&mut beta_rx).await;
    assert_eq!(reply.cmd, ripple_proto::Command::Event);
    assert_eq!(reply.seq, 21);
    let mids = sync_reply_mids(&reply.body);
    assert_eq!(mids, vec![8, 9, 10]);

    // Incremental catch-up after mid 7.
    let incremental = ripple_proto::SyncBody {
        cid: DIRECT.to_string(),
        last_mid: 7,
        limit: 50,
        before: 0,
        after: 0,
    };
    bed.dispatch(
        &beta,
        &ripple_proto::Envelope::new(ripple_proto::Command::Sync, 22, incremental.to_value()),
    )
    .await;

    let reply = recv_envelope(&mut beta_rx).await;
    assert_eq!(reply.seq, 22);
    assert_eq!(sync_reply_mids(&reply.body), vec![8, 9, 10]);
}

#[tokio::test]
async fn test_sync_without_access() {
    let bed = TestBed::new();
    let (carol, mut carol_rx) = bed.connect("carol").await;

    let body = ripple_proto::SyncBody {
        cid: "g:team".to_string(),
        ..Default::default()
    };
    bed.dispatch(
        &carol,
        &ripple_proto::Envelope::new(ripple_proto::Command::Sync, 9, body.to_value()),
    )
    .await;

    let error = expect_error(&mut carol_rx).await;
    assert_eq!(error.code, 4002);
}

#[tokio::test]
async fn test_revoke_without_target_tag() {
    let bed = TestBed::new();
    direct_pair(&bed).await;
    let (alpha, mut alpha_rx) = bed.connect("alice").await;

    // Hand-build a revoke with no tags at all.
    let mut event = Event::new(
        direct_cid(),
        "alice",
        EventBody::Revoke {
            scope: 0,
            reason: String::new(),
        },
    );
    event.tags.clear();

    bed.dispatch(&alpha, &event_request(6, &event)).await;
    let error = expect_error(&mut alpha_rx).await;
    assert_eq!(error.code, 1001);
}

/// Extract ascending mids from a sync reply body `{cid, events: [...]}`
fn sync_reply_mids(body: &rmpv::Value) -> Vec<i64> {
    let entries = body.as_map().expect("sync reply is a map");
    let events = entries
        .iter()
        .find(|(k, _)| k.as_str() == Some("events"))
        .map(|(_, v)| v.as_array().expect("events is an array"))
        .expect("sync reply has events");

    events
        .iter()
        .map(|event| {
            let fields = event.as_map().expect("stored event is a map");
            fields
                .iter()
                .find(|(k, _)| k.as_str() == Some("mid"))
                .and_then(|(_, v)| v.as_i64())
                .expect("stored event has a mid")
        })
        .collect()
}
