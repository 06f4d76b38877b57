//! Terminal surface integration tests

mod support;

use std::sync::Arc;
use std::time::Duration;

use lc_core::traits::TerminalFactory;
use lc_core::{ConnectionPhase, ReconnectPolicy};
use lc_protocol::{LabId, NodeId};
use lc_runtime::{ConsoleTarget, TerminalSurface};

use support::{advance, context, settle, MockConnector, RecordingFactory};

fn open(
    connector: &Arc<MockConnector>,
    factory: &Arc<RecordingFactory>,
    node: &str,
    ready: bool,
) -> TerminalSurface {
    TerminalSurface::open(
        context(connector, Some("tok")),
        ReconnectPolicy::CONSOLE,
        Arc::clone(factory) as Arc<dyn TerminalFactory>,
        ConsoleTarget::new("lab-1", node),
        ready,
    )
}

#[tokio::test(start_paused = true)]
async fn test_typing_reaches_device() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let _surface = open(&connector, &factory, "r1", true);
    settle().await;

    factory.terminal(0).type_keys("enable\r");
    settle().await;

    assert_eq!(connector.peer(0).sent_text(), vec!["enable\r".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_rekey_disposes_old_widget() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let mut surface = open(&connector, &factory, "r1", true);
    settle().await;

    let old_peer = connector.peer(0);
    let old_terminal = factory.terminal(0);

    surface.set_target(ConsoleTarget::new("lab-1", "r2"), true);
    assert!(old_terminal.is_disposed());
    assert_eq!(factory.created(), 2);
    assert_eq!(
        factory.identity(1),
        (LabId::new("lab-1"), NodeId::new("r2"))
    );

    // Output that was still in flight for r1 never lands anywhere
    old_peer.push_text("stale r1 output");
    settle().await;

    assert!(old_peer.client_closed());
    assert_eq!(old_terminal.writes_after_dispose(), 0);
    assert!(!factory.terminal(1).output().contains("stale"));

    let new_peer = connector.peer(1);
    new_peer.push_text("r2# ");
    settle().await;
    assert_eq!(factory.terminal(1).output(), "r2# ");
    assert!(connector.urls()[1].contains("/nodes/r2/console"));
}

#[tokio::test(start_paused = true)]
async fn test_rekey_to_same_target_is_noop() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let mut surface = open(&connector, &factory, "r1", true);
    settle().await;

    surface.set_target(ConsoleTarget::new("lab-1", "r1"), false);
    settle().await;

    assert_eq!(factory.created(), 1);
    assert_eq!(connector.attempts(), 1);
    assert!(!surface.overlay_visible());
}

#[tokio::test(start_paused = true)]
async fn test_rekey_resets_reconnect_counter() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let mut surface = open(&connector, &factory, "r1", true);
    settle().await;

    connector.refuse_next(1);
    connector.peer(0).close();
    settle().await;
    advance(Duration::from_millis(1_000)).await;
    assert_eq!(surface.status().attempt, 2);

    surface.set_target(ConsoleTarget::new("lab-1", "r2"), true);
    settle().await;

    assert_eq!(surface.status().phase, ConnectionPhase::Connected);
    assert_eq!(surface.status().attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_overlay_follows_identity() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let mut surface = open(&connector, &factory, "r1", false);
    settle().await;

    assert!(surface.overlay_visible());
    surface.dismiss_overlay();
    assert!(!surface.overlay_visible());

    // A new node gets a fresh overlay
    surface.set_target(ConsoleTarget::new("lab-1", "r2"), false);
    assert!(surface.overlay_visible());

    surface.set_ready(true);
    assert!(!surface.overlay_visible());
    assert!(surface.readiness().is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_read_only_blocks_typing() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let surface = open(&connector, &factory, "r1", true);
    settle().await;

    connector.peer(0).push_text(
        r#"{"type":"console-control","state":"read_only","message":"Job running"}"#,
    );
    settle().await;
    assert!(!surface.is_interactive());

    factory.terminal(0).type_keys("reload\r");
    settle().await;
    assert!(connector.peer(0).sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let mut surface = open(&connector, &factory, "r1", true);
    settle().await;

    surface.fit();
    assert_eq!(factory.terminal(0).fit_count(), 1);

    surface.close();
    surface.close();
    surface.fit();
    settle().await;

    assert!(factory.terminal(0).is_disposed());
    assert_eq!(factory.terminal(0).fit_count(), 1);
    assert!(connector.peer(0).client_closed());

    advance(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_closes_console() {
    let connector = MockConnector::new();
    let factory = RecordingFactory::new();
    let surface = open(&connector, &factory, "r1", true);
    settle().await;

    drop(surface);
    settle().await;

    assert!(factory.terminal(0).is_disposed());
    assert!(connector.peer(0).client_closed());
}
