// Report generation from a finished session

use crate::config::ExplorerConfig;
use crate::render::{graph_export, render_dot, render_html};
use crate::session::SessionOutcome;
use dagscope_scanner::identifier::shorten_label;
use dagscope_scanner::{EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Dot,
    Html,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "dot" | "gv" => Some(ReportFormat::Dot),
            "html" | "htm" => Some(ReportFormat::Html),
            _ => None,
        }
    }

    /// Guesses the format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_str)
    }
}

/// Identifies the run a report describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub script_address: String,
    pub filter_token: String,
    pub level_limit: usize,
}

impl ReportContext {
    pub fn new(config: &ExplorerConfig, session_id: Option<String>) -> Self {
        Self {
            session_id,
            script_address: config.script_address.clone(),
            filter_token: config.filter_token.clone(),
            level_limit: config.level_limit,
        }
    }
}

pub fn render_report(
    format: ReportFormat,
    outcome: &SessionOutcome,
    config: &ExplorerConfig,
    context: &ReportContext,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(outcome, context)),
        ReportFormat::Json => generate_json_report(outcome, config, context),
        ReportFormat::Dot => Ok(render_dot(&outcome.store)),
        ReportFormat::Html => Ok(render_html(
            &outcome.store,
            config,
            &format!("dagscope: {}", context.script_address),
        )),
    }
}

pub fn generate_text_report(outcome: &SessionOutcome, context: &ReportContext) -> String {
    let store = &outcome.store;
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          DAGSCOPE GRAPH REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    if let Some(ref id) = context.session_id {
        report.push_str(&format!("Session ID:   {}\n", id));
    }
    report.push_str(&format!("Status:       {}\n", status_label(outcome)));
    report.push_str(&format!("Address:      {}\n", context.script_address));
    report.push_str(&format!(
        "Filter:       {}\n",
        if context.filter_token.is_empty() {
            "(none)"
        } else {
            context.filter_token.as_str()
        }
    ));
    report.push_str(&format!("Depth Limit:  {}\n", context.level_limit));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!(
        "UTxOs:        {} listed, {} filtered out, {} tips\n",
        outcome.utxo_count,
        outcome.filtered_out,
        outcome.tips.len()
    ));
    report.push_str(&format!(
        "Nodes:        {} ({} utxo, {} header, {} body)\n",
        store.node_count(),
        store.count_nodes(NodeKind::Utxo),
        store.count_nodes(NodeKind::Header),
        store.count_nodes(NodeKind::Body)
    ));
    report.push_str(&format!(
        "Edges:        {} ({} accept, {} reject)\n",
        store.edge_count(),
        store.count_edges(EdgeKind::Accept),
        store.count_edges(EdgeKind::Reject)
    ));
    report.push_str(&format!("Fetched:      {}\n", outcome.summary.fetched));
    if outcome.summary.depth_limited > 0 {
        report.push_str(&format!(
            "Truncated:    {} headers at the depth limit\n",
            outcome.summary.depth_limited
        ));
    }
    report.push('\n');

    if !store.is_empty() {
        report.push_str(RULE);
        report.push_str("GRAPH\n");
        report.push_str(RULE);
        report.push('\n');
        for edge in store.edges() {
            report.push_str(&format!(
                "  {} --{}--> {}\n",
                shorten_label(&edge.from),
                edge.kind.as_str(),
                shorten_label(&edge.to)
            ));
        }
        report.push('\n');
    }

    let failures: Vec<_> = outcome
        .skipped
        .iter()
        .chain(outcome.summary.failures.iter())
        .collect();
    if outcome.utxo_error.is_some() || !failures.is_empty() {
        report.push_str(RULE);
        report.push_str("FAILURES\n");
        report.push_str(RULE);
        report.push('\n');
        if let Some(ref error) = outcome.utxo_error {
            report.push_str(&format!("  [utxo listing] {}\n", error));
        }
        for failure in failures {
            report.push_str(&format!("  [{}] {}\n", failure.id, failure.reason));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                             End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(
    outcome: &SessionOutcome,
    config: &ExplorerConfig,
    context: &ReportContext,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "dagscope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "session": context,
            "status": status_label(outcome).to_lowercase(),
            "outcome": outcome,
            "graph": graph_export(&outcome.store, config)
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn status_label(outcome: &SessionOutcome) -> &'static str {
    if outcome.is_superseded() {
        "Superseded"
    } else if outcome.failure_count() > 0 {
        "Partial"
    } else {
        "Completed"
    }
}
