//! State-sync transport integration tests

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use lc_core::{ConnectionPhase, ReconnectPolicy};
use lc_protocol::{Envelope, LabId};
use lc_runtime::{StateSyncTransport, DEFAULT_PING_INTERVAL};

use support::{advance, context, settle, MockConnector};

fn transport(connector: &Arc<MockConnector>) -> StateSyncTransport {
    StateSyncTransport::new(
        context(connector, Some("tok")),
        ReconnectPolicy::STATE_SYNC,
        DEFAULT_PING_INTERVAL,
    )
}

fn envelope(kind: &str, data: serde_json::Value) -> String {
    json!({"type": kind, "timestamp": "2026-01-01T00:00:00.000Z", "data": data}).to_string()
}

fn initial_state() -> String {
    envelope(
        "initial_state",
        json!({"nodes": [
            {"node_id": "r1", "node_name": "core-1", "actual_state": "running", "is_ready": true},
            {"node_id": "r2", "node_name": "core-2", "actual_state": "booting", "is_ready": false},
        ]}),
    )
}

fn sent_kinds(connector: &MockConnector, index: usize) -> Vec<String> {
    connector
        .peer(index)
        .sent_text()
        .iter()
        .map(|text| Envelope::decode(text).expect("client frame").kind)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_connects_to_lab_state_url() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    assert!(sync.lab().is_none());

    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    assert_eq!(sync.status().phase, ConnectionPhase::Connected);
    assert_eq!(
        connector.urls(),
        vec!["wss://lab.example/ws/labs/lab-1/state?token=tok".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_populate_store_and_callbacks() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    sync.on_node_state(move |node| sink.lock().unwrap().push(node.node_id.clone()));

    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    let peer = connector.peer(0);
    peer.push_text(&initial_state());
    peer.push_text(&envelope(
        "node_state",
        json!({"node_id": "r2", "actual_state": "running", "is_ready": true}),
    ));
    settle().await;

    let nodes = sync.node_states();
    assert_eq!(nodes.len(), 2);
    assert!(nodes["r2"].is_ready);
    assert!(sync.store().is_node_ready("r1"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["r1".to_string(), "r2".to_string(), "r2".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_links_and_lab_state() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);

    let lab_states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lab_states);
    sync.on_lab_state(move |lab| sink.lock().unwrap().push(lab.state.clone()));

    let links = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&links);
    sync.on_link_state(move |_| *counter.lock().unwrap() += 1);

    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    let peer = connector.peer(0);
    peer.push_text(&envelope(
        "initial_links",
        json!([{"link_name": "r1:e0-r2:e0", "actual_state": "up"}]),
    ));
    peer.push_text(&envelope(
        "link_state",
        json!({"link_name": "r1:e1-r3:e0", "actual_state": "down"}),
    ));
    peer.push_text(&envelope("lab_state", json!({"lab_id": "lab-1", "state": "running"})));
    settle().await;

    assert_eq!(sync.link_states().len(), 2);
    assert_eq!(*links.lock().unwrap(), 2);
    assert_eq!(sync.lab_state().unwrap().state, "running");
    assert_eq!(*lab_states.lock().unwrap(), vec!["running".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_job_progress_is_not_stored() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    sync.on_job_progress(move |job| sink.lock().unwrap().push(job.progress_percent));

    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    connector.peer(0).push_text(&envelope(
        "job_progress",
        json!({"job_id": "j1", "action": "up", "status": "running", "progress_percent": 40.0}),
    ));
    settle().await;

    assert_eq!(*progress.lock().unwrap(), vec![Some(40.0)]);
    assert!(sync.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_switching_lab_clears_state_synchronously() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    let old_peer = connector.peer(0);
    old_peer.push_text(&initial_state());
    settle().await;
    assert_eq!(sync.node_states().len(), 2);

    sync.set_lab(LabId::new("lab-2"));
    assert!(sync.node_states().is_empty());
    assert_eq!(sync.status().attempt, 0);

    // The old socket is gone; anything it still sends is ignored
    old_peer.push_text(&initial_state());
    settle().await;

    assert!(old_peer.client_closed());
    assert!(sync.node_states().is_empty());
    assert_eq!(
        connector.urls()[1],
        "wss://lab.example/ws/labs/lab-2/state?token=tok"
    );
}

#[tokio::test(start_paused = true)]
async fn test_same_lab_is_noop() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;
    connector.peer(0).push_text(&initial_state());
    settle().await;

    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(sync.node_states().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_liveness_frames_change_nothing() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    let mut status = sync.subscribe_status();
    status.borrow_and_update();

    let peer = connector.peer(0);
    peer.push_text(&json!({"type": "pong"}).to_string());
    peer.push_text(&json!({"type": "heartbeat", "timestamp": "t"}).to_string());
    peer.push_text(&json!({"type": "ping"}).to_string());
    settle().await;

    assert!(sync.store().is_empty());
    assert!(!status.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_ignored() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    let peer = connector.peer(0);
    peer.push_text("not json at all");
    peer.push_text(&json!({"type": "mystery_event", "data": {}}).to_string());
    peer.push_text(&json!({"type": "node_state"}).to_string());
    peer.push_binary(&[0xff, 0xfe]);
    peer.push_text(&envelope("node_state", json!({"node_id": "r1"})));
    settle().await;

    assert_eq!(sync.status().phase, ConnectionPhase::Connected);
    assert_eq!(sync.node_states().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pings_every_interval() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    advance(Duration::from_secs(24)).await;
    assert!(sent_kinds(&connector, 0).is_empty());

    advance(Duration::from_secs(1)).await;
    assert_eq!(sent_kinds(&connector, 0), vec!["ping".to_string()]);

    advance(Duration::from_secs(25)).await;
    assert_eq!(sent_kinds(&connector, 0), vec!["ping", "ping"]);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_only_while_connected() {
    let connector = MockConnector::new();
    connector.refuse_next(1);
    let mut sync = transport(&connector);
    assert!(!sync.refresh());

    sync.set_lab(LabId::new("lab-1"));
    settle().await;
    assert_eq!(sync.status().phase, ConnectionPhase::Disconnected);
    assert!(!sync.refresh());

    advance(Duration::from_millis(1_000)).await;
    assert_eq!(sync.status().phase, ConnectionPhase::Connected);

    // Nothing was queued while the socket was down
    assert!(sent_kinds(&connector, 0).is_empty());

    assert!(sync.refresh());
    settle().await;
    assert_eq!(sent_kinds(&connector, 0), vec!["refresh".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_unbounded() {
    let connector = MockConnector::new();
    connector.refuse_all();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;

    for _ in 0..20 {
        advance(Duration::from_secs(30)).await;
    }

    let status = sync.status();
    assert_eq!(connector.attempts(), 21);
    assert_eq!(status.phase, ConnectionPhase::Disconnected);
    assert_eq!(status.attempt, 21);
    assert_eq!(
        status.overlay_text().as_deref(),
        Some("Reconnecting… attempt 21")
    );

    connector.accept();
    advance(Duration::from_secs(30)).await;
    assert_eq!(sync.status().phase, ConnectionPhase::Connected);
    assert_eq!(sync.status().attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_socket_reconnects_silently() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;
    connector.peer(0).push_text(&initial_state());
    settle().await;

    connector.peer(0).close();
    settle().await;
    assert_eq!(sync.status().phase, ConnectionPhase::Disconnected);
    // Last known state stays readable while reconnecting
    assert_eq!(sync.node_states().len(), 2);

    advance(Duration::from_millis(1_000)).await;
    assert_eq!(connector.opened(), 2);
    assert_eq!(sync.status().phase, ConnectionPhase::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_everything() {
    let connector = MockConnector::new();
    let mut sync = transport(&connector);
    sync.set_lab(LabId::new("lab-1"));
    settle().await;
    connector.peer(0).push_text(&initial_state());
    settle().await;

    sync.disconnect();
    settle().await;

    assert!(sync.lab().is_none());
    assert!(sync.node_states().is_empty());
    assert!(connector.peer(0).client_closed());

    let status = sync.status();
    assert_eq!(status.phase, ConnectionPhase::Disconnected);
    assert_eq!(status.attempt, 0);
    assert!(status.overlay_text().is_none());
    assert!(!sync.refresh());

    advance(Duration::from_secs(120)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(sync.status().phase, ConnectionPhase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_new_transport_is_idle() {
    let connector = MockConnector::new();
    let sync = transport(&connector);
    settle().await;

    assert_eq!(sync.status().phase, ConnectionPhase::Disconnected);
    assert_eq!(sync.status().attempt, 0);
    assert_eq!(connector.attempts(), 0);
}
