//! Connection behavior against an in-memory browser.

mod support;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use support::{eventually, Harness};
use tabwire_core::{CdpError, Command, Event, SessionId};

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    echo: u64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_get_unique_ids_and_matching_replies() {
    let (harness, socket) = Harness::open().await;
    let (log, _browser) = socket.respond_with(|frame| {
        Some(json!({"id": frame["id"], "result": {"echo": frame["params"]["n"]}}))
    });

    let mut tasks = Vec::new();
    for n in 0..32u64 {
        let connection = Arc::clone(&harness.connection);
        tasks.push(tokio::spawn(async move {
            let cmd = Command::<Echo>::new("Runtime.evaluate", json!({"n": n}));
            let reply = connection.send_and_wait(None, &cmd, Duration::from_secs(5)).await;
            (n, reply)
        }));
    }
    for task in tasks {
        let (n, reply) = task.await.unwrap();
        assert_eq!(reply.unwrap(), Echo { echo: n });
    }

    let ids: HashSet<u64> = log
        .lock()
        .unwrap()
        .iter()
        .map(|frame| frame["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids.len(), 32);
    assert_eq!(harness.connection.pending_requests(), 0);
}

#[tokio::test]
async fn test_session_id_only_sent_when_present() {
    let (harness, mut socket) = Harness::open().await;
    let cmd = Command::void("Page.enable", Value::Null).does_not_send_response();

    harness.connection.send(None, &cmd).await.unwrap();
    let frame = socket.next_frame().await;
    assert_eq!(frame["method"], "Page.enable");
    assert_eq!(frame["params"], json!({}));
    assert!(frame.get("sessionId").is_none());

    let session = SessionId::new("S1");
    harness.connection.send(Some(&session), &cmd).await.unwrap();
    let frame = socket.next_frame().await;
    assert_eq!(frame["sessionId"], "S1");
}

#[tokio::test]
async fn test_ids_increase_from_one() {
    let (harness, mut socket) = Harness::open().await;
    let cmd = Command::void("Page.enable", json!({})).does_not_send_response();

    let first = harness.connection.send(None, &cmd).await.unwrap();
    let second = harness.connection.send(None, &cmd).await.unwrap();
    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    assert_eq!(socket.next_frame().await["id"], 1);
    assert_eq!(socket.next_frame().await["id"], 2);
}

#[tokio::test]
async fn test_protocol_error_reply() {
    let (harness, socket) = Harness::open().await;
    let (_log, _browser) = socket.respond_with(|frame| {
        Some(json!({"id": frame["id"], "error": {
            "code": -32601,
            "message": "'Nope.nope' wasn't found",
            "data": "extra"
        }}))
    });

    let err = harness
        .connection
        .send_and_wait(None, &Command::void("Nope.nope", json!({})), Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        CdpError::Protocol {
            code,
            message,
            data,
            raw,
        } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "'Nope.nope' wasn't found");
            assert_eq!(data.as_deref(), Some("extra"));
            assert_eq!(raw["code"], -32601);
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_decode_error_reaches_only_its_caller() {
    let (harness, socket) = Harness::open().await;
    let (_log, _browser) = socket.respond_with(|frame| {
        let result = match frame["method"].as_str() {
            Some("Bad.shape") => json!({"echo": "not a number"}),
            _ => json!({"echo": 7}),
        };
        Some(json!({"id": frame["id"], "result": result}))
    });

    let timeout = Duration::from_secs(5);
    let bad = Command::<Echo>::new("Bad.shape", json!({}));
    let good = Command::<Echo>::new("Good.shape", json!({}));

    let (bad, good) = tokio::join!(
        harness.connection.send_and_wait(None, &bad, timeout),
        harness.connection.send_and_wait(None, &good, timeout),
    );
    assert!(matches!(bad, Err(CdpError::Decode { ref method, .. }) if method == "Bad.shape"));
    assert_eq!(good.unwrap(), Echo { echo: 7 });
    assert!(!harness.connection.is_closed());
}

#[tokio::test]
async fn test_timeout_removes_pending_and_late_reply_is_counted() {
    let (harness, mut socket) = Harness::open().await;
    let cmd = Command::void("Runtime.slow", json!({}));

    let started = Instant::now();
    let err = harness
        .connection
        .send_and_wait(None, &cmd, Duration::from_millis(50))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(matches!(err, CdpError::Timeout { ref method, .. } if method == "Runtime.slow"));
    assert!(elapsed >= Duration::from_millis(50), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(200), "returned after {:?}", elapsed);
    assert_eq!(harness.connection.pending_requests(), 0);

    let id = socket.next_frame().await["id"].as_u64().unwrap();
    assert!(!harness.connection.is_pending(id));

    socket.reply(id, json!({}));
    let connection = Arc::clone(&harness.connection);
    eventually(move || connection.stats().late_replies == 1).await;
    assert!(!harness.connection.is_closed());
}

#[tokio::test]
async fn test_duplicate_reply_resolves_once() {
    let (harness, mut socket) = Harness::open().await;
    let reply = harness
        .connection
        .send(None, &Command::<Echo>::new("Runtime.evaluate", json!({})))
        .await
        .unwrap();

    let id = socket.next_frame().await["id"].as_u64().unwrap();
    socket.reply(id, json!({"echo": 1}));
    socket.reply(id, json!({"echo": 2}));

    assert_eq!(reply.await.unwrap(), Echo { echo: 1 });
    let connection = Arc::clone(&harness.connection);
    eventually(move || connection.stats().late_replies == 1).await;
}

#[tokio::test]
async fn test_fire_and_forget_resolves_immediately() {
    let (harness, mut socket) = Harness::open().await;
    let cmd = Command::void("Runtime.runIfWaitingForDebugger", json!({})).does_not_send_response();

    let reply = harness.connection.send(None, &cmd).await.unwrap();
    assert_eq!(harness.connection.pending_requests(), 0);
    reply.await.unwrap();

    let frame = socket.next_frame().await;
    assert_eq!(frame["method"], "Runtime.runIfWaitingForDebugger");
}

#[tokio::test]
async fn test_write_failure_is_synchronous_and_leaves_no_pending() {
    let (harness, socket) = Harness::open().await;
    let support::FakeSocket { outbound, inbound } = socket;
    drop(outbound);

    let err = harness
        .connection
        .send(None, &Command::void("Page.enable", json!({})))
        .await
        .err()
        .expect("write should fail");
    assert!(matches!(err, CdpError::WebSocket(_)), "got {:?}", err);
    assert_eq!(harness.connection.pending_requests(), 0);
    drop(inbound);
}

#[tokio::test]
async fn test_listeners_fan_out_in_order() {
    let (harness, socket) = Harness::open().await;
    let event = Event::<Value>::new("Page.loadEventFired");
    let seen = Arc::new(Mutex::new(Vec::new()));

    for listener in 0..3 {
        let seen = Arc::clone(&seen);
        harness.connection.add_listener(&event, move |sequence, params: Value| {
            seen.lock().unwrap().push((listener, sequence, params["n"].as_u64().unwrap()));
        });
    }
    assert_eq!(harness.connection.listener_count("Page.loadEventFired"), 3);

    for n in 0..5 {
        socket.event("Page.loadEventFired", json!({"n": n}));
    }

    let done = Arc::clone(&seen);
    eventually(move || done.lock().unwrap().len() == 15).await;

    let seen = seen.lock().unwrap();
    for (n, chunk) in seen.chunks(3).enumerate() {
        let sequence = chunk[0].1;
        for (listener, entry) in chunk.iter().enumerate() {
            assert_eq!(*entry, (listener, sequence, n as u64));
        }
    }
    let sequences: Vec<u64> = seen.chunks(3).map(|chunk| chunk[0].1).collect();
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_event_without_params_is_suppressed() {
    let (harness, socket) = Harness::open().await;
    let mut events = harness.connection.listen(&Event::<Value>::new("Inspector.detached"));

    socket.push(json!({"method": "Inspector.detached"}));
    socket.event("Inspector.detached", json!({"reason": "closed"}));

    let (_, params) = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(params["reason"], "closed");
    assert!(events.try_recv().is_err());
    assert_eq!(harness.connection.stats().dropped_frames, 1);
}

#[tokio::test]
async fn test_undecodable_event_skips_only_that_listener() {
    let (harness, socket) = Harness::open().await;
    let strict = Event::<Echo>::new("Custom.tick");
    let loose = Event::<Value>::new("Custom.tick");

    let mut strict_rx = harness.connection.listen(&strict);
    let mut loose_rx = harness.connection.listen(&loose);

    socket.event("Custom.tick", json!({"echo": "text"}));
    socket.event("Custom.tick", json!({"echo": 3}));

    let (_, first) = loose_rx.recv().await.unwrap();
    let (_, second) = loose_rx.recv().await.unwrap();
    assert_eq!(first["echo"], "text");
    assert_eq!(second["echo"], 3);

    let (_, decoded) = strict_rx.recv().await.unwrap();
    assert_eq!(decoded, Echo { echo: 3 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_listener_does_not_block_other_methods() {
    let (harness, socket) = Harness::open().await;
    let gate = Arc::new(std::sync::Barrier::new(2));

    let blocked = Arc::clone(&gate);
    harness
        .connection
        .add_listener(&Event::<Value>::new("Slow.event"), move |_, _| {
            blocked.wait();
        });
    let mut fast = harness.connection.listen(&Event::<Value>::new("Fast.event"));

    socket.event("Slow.event", json!({}));
    socket.event("Fast.event", json!({"ok": true}));

    let (_, params) = tokio::time::timeout(Duration::from_secs(5), fast.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(params["ok"], true);
    gate.wait();
}

#[tokio::test]
async fn test_unrecognized_frames_are_not_fatal() {
    let (harness, mut socket) = Harness::open().await;

    socket.push_text("not json at all");
    socket.push(json!({"hello": "world"}));

    let reply = harness
        .connection
        .send(None, &Command::<Echo>::new("Runtime.evaluate", json!({})))
        .await
        .unwrap();
    let id = socket.next_frame().await["id"].as_u64().unwrap();
    socket.reply(id, json!({"echo": 9}));

    assert_eq!(reply.await.unwrap(), Echo { echo: 9 });
    assert_eq!(harness.connection.stats().dropped_frames, 2);
    assert_eq!(harness.connection.stats().frames_received, 3);
}

#[tokio::test]
async fn test_socket_close_fails_pending_requests() {
    let (harness, mut socket) = Harness::open().await;
    let reply = harness
        .connection
        .send(None, &Command::void("Runtime.slow", json!({})))
        .await
        .unwrap();
    socket.next_frame().await;

    drop(socket);

    assert!(matches!(reply.await, Err(CdpError::ConnectionClosed)));
    let connection = Arc::clone(&harness.connection);
    eventually(move || connection.is_closed()).await;

    let err = harness
        .connection
        .send(None, &Command::void("Page.enable", json!({})))
        .await
        .err()
        .expect("send on a closed connection");
    assert!(matches!(err, CdpError::ConnectionClosed));
}

#[tokio::test]
async fn test_reopen_uses_a_fresh_socket() {
    let (mut harness, socket) = Harness::open().await;
    drop(socket);
    let connection = Arc::clone(&harness.connection);
    eventually(move || connection.is_closed()).await;

    harness.connection.reopen().await.unwrap();
    assert!(!harness.connection.is_closed());
    assert_eq!(harness.client.opened(), 2);

    let socket = harness.next_socket().await;
    let (_log, _browser) = socket.respond_with(|frame| {
        Some(json!({"id": frame["id"], "result": {"echo": 5}}))
    });
    let echo = harness
        .connection
        .send_and_wait(
            None,
            &Command::<Echo>::new("Runtime.evaluate", json!({})),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(echo, Echo { echo: 5 });
}

#[tokio::test]
async fn test_reopen_failure_is_returned() {
    let (harness, socket) = Harness::open().await;
    drop(socket);
    harness.client.fail_open(true);

    let err = harness.connection.reopen().await.unwrap_err();
    assert!(matches!(err, CdpError::ConnectionFailed(_)));
}

#[tokio::test]
async fn test_close_fails_pending_and_stops_sends() {
    let (harness, mut socket) = Harness::open().await;
    let reply = harness
        .connection
        .send(None, &Command::void("Runtime.slow", json!({})))
        .await
        .unwrap();
    socket.next_frame().await;

    harness.connection.close().await;

    assert!(harness.connection.is_closed());
    assert!(matches!(reply.await, Err(CdpError::ConnectionClosed)));
    assert_eq!(harness.connection.pending_requests(), 0);
}

#[tokio::test]
async fn test_clear_listeners() {
    let (harness, socket) = Harness::open().await;
    let event = Event::<Value>::new("Page.frameNavigated");
    let mut rx = harness.connection.listen(&event);
    assert_eq!(harness.connection.listener_count("Page.frameNavigated"), 1);

    harness.connection.clear_listeners();
    assert_eq!(harness.connection.listener_count("Page.frameNavigated"), 0);

    socket.event("Page.frameNavigated", json!({}));
    assert!(rx.recv().await.is_none());
}
