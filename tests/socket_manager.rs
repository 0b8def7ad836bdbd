//! Socket manager against a live relay.

#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use common::{RECV_TIMEOUT, TestRelay};
use zycare_relay::client::{ConnectionState, SocketManager};
use zycare_relay::config::ClientConfig;
use zycare_relay::domain::{Role, RoomName, ServerEvent, ServerEventKind};

fn manager_for(relay: &TestRelay) -> SocketManager {
    SocketManager::new(
        ClientConfig::new(relay.ws_url()).with_reconnect(5, Duration::from_millis(50)),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Subscribes `manager` to `kind` and returns the stream of matching events.
fn collect(manager: &SocketManager, kind: ServerEventKind) -> mpsc::UnboundedReceiver<ServerEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.on(kind, move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    match tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await {
        Ok(Some(event)) => event,
        _ => panic!("no event delivered to handler"),
    }
}

#[tokio::test]
async fn repeated_connect_opens_one_socket() {
    let relay = TestRelay::start().await;
    let manager = manager_for(&relay);

    manager.connect("d1", Role::Doctor);
    manager.connect("d1", Role::Doctor);
    relay.wait_for_members("doctor_d1", 1).await;
    wait_until(|| manager.is_connected(), "connected").await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.state.registry.connection_count().await, 1);
    assert_eq!(relay.state.registry.members(&RoomName::new("doctors")).await.len(), 1);
    manager.disconnect();
}

#[tokio::test]
async fn emits_reach_subscribed_handlers_on_the_other_side() {
    let relay = TestRelay::start().await;
    let doctor = manager_for(&relay);
    let patient = manager_for(&relay);
    let mut queue = collect(&doctor, ServerEventKind::QueueUpdated);

    doctor.connect("d1", Role::Doctor);
    patient.connect("p1", Role::Patient);
    relay.wait_for_members("doctors", 1).await;
    relay.wait_for_members("patients", 1).await;

    let data = json!({"patientId": "p1", "patientName": "Asha"});
    if patient.join_queue(data.clone()).is_err() {
        panic!("emit rejected");
    }
    assert_eq!(next(&mut queue).await, ServerEvent::QueueUpdated(data));

    let mut notes = collect(&patient, ServerEventKind::Notification);
    if doctor
        .send_notification(Role::Patient, "p1", "You are next", None)
        .is_err()
    {
        panic!("emit rejected");
    }
    let ServerEvent::Notification(note) = next(&mut notes).await else {
        panic!("wrong event");
    };
    assert_eq!(note.get("recipientType"), Some(&json!("patient")));
    assert_eq!(note.get("message"), Some(&json!("You are next")));
    assert_eq!(note.get("type"), Some(&json!("info")));
    assert!(note.get("timestamp").and_then(|t| t.as_str()).is_some());

    doctor.disconnect();
    patient.disconnect();
}

#[tokio::test]
async fn emit_before_connected_is_sent_after_join() {
    let relay = TestRelay::start().await;
    let mut doctor = relay.doctor("d1").await;
    let patient = manager_for(&relay);

    patient.connect("p1", Role::Patient);
    if patient.announce_ticket(json!({"ticketId": "T-1"})).is_err() {
        panic!("emit rejected");
    }

    assert_eq!(
        doctor.recv().await,
        ("new_patient".to_string(), json!({"ticketId": "T-1"}))
    );
    assert!(
        relay
            .state
            .registry
            .members(&RoomName::new("patient_p1"))
            .await
            .len()
            == 1
    );
    patient.disconnect();
}

#[tokio::test]
async fn off_without_handle_silences_every_handler() {
    let relay = TestRelay::start().await;
    let manager = manager_for(&relay);
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let hits = Arc::clone(&hits);
        manager.on(ServerEventKind::NewPatient, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(manager.off(ServerEventKind::NewPatient, None), 2);

    let mut witness = collect(&manager, ServerEventKind::NewPatient);
    manager.connect("d1", Role::Doctor);
    relay.wait_for_members("doctors", 1).await;

    let mut patient = relay.patient("p1").await;
    patient.emit("new_ticket", json!({})).await;
    let _ = next(&mut witness).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    manager.disconnect();
}

#[tokio::test]
async fn reconnect_rejoins_rooms_and_keeps_handlers() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    // The first socket is dropped right after its join; the second one
    // stays up and pushes a notification.
    let (joins_tx, mut joins_rx) = mpsc::unbounded_channel::<Value>();
    tokio::spawn(async move {
        let mut first = true;
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let Some(Ok(Message::Text(join))) = ws.next().await else {
                continue;
            };
            let _ = joins_tx.send(serde_json::from_str(join.as_str()).unwrap_or(Value::Null));
            if std::mem::replace(&mut first, false) {
                continue;
            }
            let note = json!({"event": "notification", "data": {"recipientId": "p1", "message": "back"}});
            let _ = ws.send(Message::text(note.to_string())).await;
            tokio::spawn(async move { while ws.next().await.is_some() {} });
        }
    });

    let manager = SocketManager::new(
        ClientConfig::new(format!("ws://{addr}/ws")).with_reconnect(5, Duration::from_millis(20)),
    );
    let mut notes = collect(&manager, ServerEventKind::Notification);
    manager.connect("p1", Role::Patient);

    let join = json!({"event": "join_patient_room", "data": "p1"});
    for attempt in ["first", "second"] {
        match tokio::time::timeout(RECV_TIMEOUT, joins_rx.recv()).await {
            Ok(Some(frame)) => assert_eq!(frame, join, "{attempt} join"),
            _ => panic!("no {attempt} join"),
        }
    }

    let ServerEvent::Notification(note) = next(&mut notes).await else {
        panic!("wrong event");
    };
    assert_eq!(note.get("message"), Some(&json!("back")));
    wait_until(|| manager.is_connected(), "reconnected").await;
    manager.disconnect();
}

#[tokio::test]
async fn managers_sharing_an_identity_do_not_evict_each_other() {
    let relay = TestRelay::start().await;
    let older = manager_for(&relay);
    let newer = manager_for(&relay);

    older.connect("p1", Role::Patient);
    relay.wait_for_members("patient_p1", 1).await;
    wait_until(|| older.is_connected(), "older connected").await;

    newer.connect("p1", Role::Patient);
    wait_until(
        || older.state() == ConnectionState::Disconnected && older.identity().is_none(),
        "older replaced",
    )
    .await;
    wait_until(|| newer.is_connected(), "newer connected").await;
    relay.wait_for_connections(1).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(relay.state.registry.connection_count().await, 1);
    assert_eq!(relay.state.registry.members(&RoomName::new("patient_p1")).await.len(), 1);
    assert_eq!(older.state(), ConnectionState::Disconnected);
    assert!(newer.is_connected());
    assert!(older.join_queue(json!({})).is_err());
    newer.disconnect();
}

#[tokio::test]
async fn replaced_manager_leaves_the_newer_socket_alone() {
    let relay = TestRelay::start().await;
    let manager = manager_for(&relay);
    let mut prescriptions = collect(&manager, ServerEventKind::PrescriptionReceived);

    manager.connect("p1", Role::Patient);
    relay.wait_for_members("patient_p1", 1).await;
    wait_until(|| manager.is_connected(), "connected").await;

    let mut newer = relay.client().await;
    newer.emit("join_patient_room", json!("p1")).await;
    wait_until(
        || manager.state() == ConnectionState::Disconnected,
        "manager replaced",
    )
    .await;
    relay.wait_for_connections(1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    relay.wait_for_members("patient_p1", 1).await;

    let mut doctor = relay.doctor("d1").await;
    let prescription = json!({"patientId": "p1", "drug": "x"});
    doctor.emit("prescription_created", prescription.clone()).await;
    assert_eq!(
        newer.recv().await,
        ("prescription_received".to_string(), prescription)
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(150), prescriptions.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn disconnect_is_terminal() {
    let relay = TestRelay::start().await;
    let manager = manager_for(&relay);
    manager.connect("d1", Role::Doctor);
    relay.wait_for_members("doctor_d1", 1).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    relay.wait_for_connections(0).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(relay.state.registry.connection_count().await, 0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.join_queue(json!({})).is_err());
}

#[tokio::test]
async fn gives_up_after_configured_attempts() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let manager = SocketManager::new(
        ClientConfig::new(format!("ws://{addr}/ws")).with_reconnect(2, Duration::from_millis(20)),
    );
    manager.connect("d1", Role::Doctor);

    wait_until(|| accepted.load(Ordering::SeqCst) >= 3, "three attempts").await;
    wait_until(
        || manager.state() == ConnectionState::Disconnected && manager.identity().is_none(),
        "give up",
    )
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.join_queue(json!({})).is_err());

    // A fresh connect starts over.
    manager.connect("d1", Role::Doctor);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    manager.disconnect();
}
