//! Watch command: follow a lab's state-sync stream

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use lc_core::{ConnectionPhase, ReconnectPolicy};
use lc_protocol::LabId;
use lc_runtime::{ConnectionContext, StateSyncTransport};

use crate::output::{
    describe_job, describe_lab, describe_link, describe_node, format_links, format_nodes,
    print_info, print_success, print_warning,
};

/// How `watch` reports what it sees
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Ask for a fresh snapshot each time the socket opens
    pub refresh: bool,
    /// One JSON object per event instead of text lines
    pub json: bool,
    /// Print node and link tables on exit
    pub summary: bool,
}

#[derive(Serialize)]
struct JsonEvent<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

fn emit<T: Serialize>(json: bool, event: &str, data: &T, text: impl FnOnce() -> String) {
    if json {
        match serde_json::to_string(&JsonEvent { event, data }) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to encode {} event: {}", event, e),
        }
    } else {
        println!("{}", text());
    }
}

/// Follow `lab` until Ctrl+C
pub async fn watch_command(
    ctx: ConnectionContext,
    policy: ReconnectPolicy,
    ping_interval: Duration,
    lab: &str,
    options: WatchOptions,
) -> Result<()> {
    let json = options.json;
    let mut transport = StateSyncTransport::new(ctx, policy, ping_interval);

    transport.on_node_state(move |node| emit(json, "node_state", node, || describe_node(node)));
    transport.on_link_state(move |link| emit(json, "link_state", link, || describe_link(link)));
    transport.on_lab_state(move |lab| emit(json, "lab_state", lab, || describe_lab(lab)));
    transport.on_job_progress(move |job| emit(json, "job_progress", job, || describe_job(job)));

    let mut status = transport.subscribe_status();
    transport.set_lab(LabId::new(lab));

    if !json {
        print_info(&format!("Watching lab {} (Ctrl+C to stop)", lab));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                tracing::debug!(lab = %lab, phase = %current.phase, attempt = current.attempt, "State sync status");

                if current.phase == ConnectionPhase::Connected && options.refresh {
                    transport.refresh();
                }
                if !json {
                    match current.overlay_text() {
                        Some(text) => print_warning(&text),
                        None if current.is_connected() => print_success("Connected"),
                        None => {}
                    }
                }
            }
        }
    }

    let nodes = transport.node_states();
    let links = transport.link_states();
    transport.shutdown().await;

    if options.summary && !json {
        println!("{}", format_nodes(&nodes));
        println!("{}", format_links(&links));
    }

    Ok(())
}
