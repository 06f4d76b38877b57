//! Output formatting utilities for the CLI
//!
//! Tables for node and link snapshots, one-line renderings of state-sync
//! events, and colored status messages.

use std::collections::HashMap;
use std::io::Write;

use tabled::{settings::Style, Table, Tabled};

use lc_protocol::{JobProgress, LabState, LinkStateEntry, NodeStateEntry};

/// Format node snapshots as a table, sorted by node id
pub fn format_nodes(nodes: &HashMap<String, NodeStateEntry>) -> String {
    if nodes.is_empty() {
        return "No nodes".to_string();
    }

    #[derive(Tabled)]
    struct NodeRow {
        #[tabled(rename = "NODE")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "DESIRED")]
        desired: String,
        #[tabled(rename = "ACTUAL")]
        actual: String,
        #[tabled(rename = "READY")]
        ready: String,
        #[tabled(rename = "ERROR")]
        error: String,
    }

    let mut entries: Vec<&NodeStateEntry> = nodes.values().collect();
    entries.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let rows: Vec<NodeRow> = entries
        .into_iter()
        .map(|n| NodeRow {
            id: truncate(&n.node_id, 24),
            name: n.node_name.clone().unwrap_or_else(|| "-".to_string()),
            desired: n.desired_state.clone().unwrap_or_else(|| "-".to_string()),
            actual: n.actual_state.clone(),
            ready: if n.is_ready { "yes" } else { "no" }.to_string(),
            error: n
                .error_message
                .as_deref()
                .map(|e| truncate(e, 40))
                .unwrap_or_default(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format link snapshots as a table, sorted by link name
pub fn format_links(links: &HashMap<String, LinkStateEntry>) -> String {
    if links.is_empty() {
        return "No links".to_string();
    }

    #[derive(Tabled)]
    struct LinkRow {
        #[tabled(rename = "LINK")]
        name: String,
        #[tabled(rename = "ENDPOINTS")]
        endpoints: String,
        #[tabled(rename = "DESIRED")]
        desired: String,
        #[tabled(rename = "ACTUAL")]
        actual: String,
    }

    let mut entries: Vec<&LinkStateEntry> = links.values().collect();
    entries.sort_by(|a, b| a.link_name.cmp(&b.link_name));

    let rows: Vec<LinkRow> = entries
        .into_iter()
        .map(|l| LinkRow {
            name: truncate(&l.link_name, 32),
            endpoints: format!(
                "{} <-> {}",
                l.source_node.as_deref().unwrap_or("?"),
                l.target_node.as_deref().unwrap_or("?")
            ),
            desired: l.desired_state.clone().unwrap_or_else(|| "-".to_string()),
            actual: l.actual_state.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn describe_node(node: &NodeStateEntry) -> String {
    let mut line = format!(
        "node {} {}{}",
        node.node_name.as_deref().unwrap_or(&node.node_id),
        node.actual_state,
        if node.is_ready { " (ready)" } else { "" }
    );
    if let Some(err) = &node.error_message {
        line.push_str(&format!(": {}", err));
    }
    line
}

pub fn describe_link(link: &LinkStateEntry) -> String {
    let mut line = format!("link {} {}", link.link_name, link.actual_state);
    if let Some(err) = &link.error_message {
        line.push_str(&format!(": {}", err));
    }
    line
}

pub fn describe_lab(lab: &LabState) -> String {
    match &lab.error {
        Some(err) => format!("lab {} {}: {}", lab.lab_id, lab.state, err),
        None => format!("lab {} {}", lab.lab_id, lab.state),
    }
}

pub fn describe_job(job: &JobProgress) -> String {
    let mut line = format!("job {}", job.job_id);
    if let Some(action) = &job.action {
        line.push_str(&format!(" {}", action));
    }
    line.push_str(&format!(" {}", job.status));
    if let Some(percent) = job.progress_percent {
        line.push_str(&format!(" {:.0}%", percent));
    }
    if let Some(message) = &job.message {
        line.push_str(&format!(" - {}", message));
    }
    line
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in blue with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Blue),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a status line while the terminal is in raw mode
///
/// Raw mode disables newline translation, so the line is framed with
/// explicit carriage returns.
pub fn print_raw_status(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        Print("\r\n"),
        SetForegroundColor(Color::Yellow),
        Print(msg),
        ResetColor,
        Print("\r\n")
    );
    let _ = stdout.flush();
}
