//! Graph output: an interactive vis-network page, Graphviz DOT and a JSON
//! export of the node/edge store.

use crate::config::ExplorerConfig;
use dagscope_scanner::identifier::{is_content_identifier, transaction_hash};
use dagscope_scanner::{Edge, EdgeKind, GraphStore, Node, NodeKind};
use petgraph::dot::{Config, Dot};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use serde_json::{Value, json};

/// Milliseconds of physics simulation before the layout is frozen.
pub const PHYSICS_SETTLE_MS: u64 = 15_000;

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<script src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
<style>
  html, body { margin: 0; height: 100%; font-family: sans-serif; }
  #graph { width: 100%; height: 100%; }
</style>
</head>
<body>
<div id="graph"></div>
<script>
  const nodes = new vis.DataSet(__NODES__);
  const edges = new vis.DataSet(__EDGES__);
  const options = {
    layout: { hierarchical: { direction: "RL", sortMethod: "directed" } },
    interaction: { hover: true }
  };
  const network = new vis.Network(document.getElementById("graph"), { nodes, edges }, options);
  network.on("click", (params) => {
    if (params.nodes.length === 0) return;
    const node = nodes.get(params.nodes[0]);
    if (node && node.url) window.open(node.url, "_blank");
  });
  setTimeout(() => network.setOptions({ physics: false }), __SETTLE_MS__);
</script>
</body>
</html>
"#;

struct Style {
    color: &'static str,
    shape: &'static str,
}

fn node_style(kind: NodeKind) -> Style {
    match kind {
        NodeKind::Utxo => Style {
            color: "coral",
            shape: "ellipse",
        },
        NodeKind::Header => Style {
            color: "cornflowerblue",
            shape: "box",
        },
        NodeKind::Body => Style {
            color: "darkseagreen",
            shape: "box",
        },
    }
}

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::UtxoLink => "coral",
        EdgeKind::Accept => "cornflowerblue",
        EdgeKind::Reject => "crimson",
        EdgeKind::BodyLink => "darkseagreen",
    }
}

/// Where a click on `id` should lead: the IPLD explorer for content
/// identifiers, the Cardano explorer for `<tx_hash>#<index>` ids, nowhere
/// otherwise.
pub fn explorer_url(id: &str, config: &ExplorerConfig) -> Option<String> {
    if is_content_identifier(id) {
        return Some(format!("{}{}", config.ipld_explorer_base(), id));
    }
    transaction_hash(id)
        .map(|hash| format!("{}transaction/{}", config.cardano_explorer_base(), hash))
}

/// Hover text: kind, full id, then any metadata.
pub fn node_title(node: &Node) -> String {
    let heading = match node.kind {
        NodeKind::Utxo => "UTxO",
        NodeKind::Header => "Block header",
        NodeKind::Body => "Block body",
    };
    let mut lines = vec![heading.to_string(), node.id.clone()];
    lines.extend(node.metadata.iter().map(|(k, v)| format!("{}: {}", k, v)));
    lines.join("\n")
}

#[derive(Debug, Serialize)]
pub struct NodeExport<'a> {
    #[serde(flatten)]
    pub node: &'a Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GraphExport<'a> {
    pub nodes: Vec<NodeExport<'a>>,
    pub edges: Vec<&'a Edge>,
}

pub fn graph_export<'a>(store: &'a GraphStore, config: &ExplorerConfig) -> GraphExport<'a> {
    GraphExport {
        nodes: store
            .nodes()
            .map(|node| NodeExport {
                node,
                url: explorer_url(&node.id, config),
            })
            .collect(),
        edges: store.edges().collect(),
    }
}

fn vis_nodes(store: &GraphStore, config: &ExplorerConfig) -> Vec<Value> {
    store
        .nodes()
        .map(|node| {
            let style = node_style(node.kind);
            let mut vis = json!({
                "id": node.id,
                "label": node.display_label,
                "title": node_title(node),
                "color": style.color,
                "shape": style.shape,
            });
            if let Some(url) = explorer_url(&node.id, config) {
                vis["url"] = Value::String(url);
            }
            vis
        })
        .collect()
}

fn vis_edges(store: &GraphStore) -> Vec<Value> {
    store
        .edges()
        .map(|edge| {
            json!({
                "id": edge.id,
                "from": edge.from,
                "to": edge.to,
                "arrows": "to",
                "color": edge_color(edge.kind),
                "dashes": edge.kind == EdgeKind::Reject,
            })
        })
        .collect()
}

/// JSON that is safe to inline inside a `<script>` element.
fn script_json(value: &[Value]) -> String {
    Value::from(value.to_vec())
        .to_string()
        .replace("</", "<\\/")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_html(store: &GraphStore, config: &ExplorerConfig, title: &str) -> String {
    HTML_TEMPLATE
        .replace("__TITLE__", &escape_html(title))
        .replace("__NODES__", &script_json(&vis_nodes(store, config)))
        .replace("__EDGES__", &script_json(&vis_edges(store)))
        .replace("__SETTLE_MS__", &PHYSICS_SETTLE_MS.to_string())
}

fn dot_node_attributes(node: &Node) -> String {
    let style = node_style(node.kind);
    format!(
        "shape={} style=filled fillcolor=\"{}\" tooltip=\"{}\"",
        style.shape,
        style.color,
        node.id.replace('"', "\\\"")
    )
}

fn dot_edge_attributes(kind: EdgeKind) -> String {
    let style = if kind == EdgeKind::Reject {
        " style=dashed"
    } else {
        ""
    };
    format!("color=\"{}\"{}", edge_color(kind), style)
}

pub fn render_dot(store: &GraphStore) -> String {
    let dot = Dot::with_attr_getters(
        store.graph(),
        &[Config::EdgeNoLabel],
        &|_, edge| dot_edge_attributes(edge.weight().kind),
        &|_, (_, node)| dot_node_attributes(node),
    );
    format!("{}", dot)
}
