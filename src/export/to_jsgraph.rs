use crate::errors::ImportExportResult;
use crate::export::renderer::{edge_contexts, node_contexts, NodeContext};
use crate::graph::GraphView;
use crate::pipeline::exposure::ExposureSummary;
use crate::plan::RenderConfig;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

const PALETTE: [&str; 6] = [
    "#1f78b4", "#33a02c", "#e31a1c", "#ff7f00", "#6a3d9a", "#b15928",
];

const EXPOSED_BORDER: &str = "#d62728";
const TRANSITIVE_BORDER: &str = "#ff9900";

const VNET_ICON: &str = "data:image/svg+xml;utf8,<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 64 64'><rect x='4' y='14' width='56' height='36' rx='6' fill='%23e8f1fb' stroke='%230078d4' stroke-width='3'/><circle cx='20' cy='32' r='5' fill='%230078d4'/><circle cx='32' cy='32' r='5' fill='%230078d4'/><circle cx='44' cy='32' r='5' fill='%230078d4'/></svg>";

/// Icon and size for a resource kind.
fn icon_for(kind: &str) -> (&'static str, u32) {
    match kind {
        "internet" => (
            "https://cdn-icons-png.flaticon.com/512/1011/1011373.png",
            40,
        ),
        "virtual-machine" => ("https://cdn-icons-png.flaticon.com/512/8036/8036436.png", 25),
        "vm-extension" => (
            "https://cdn-icons-png.flaticon.com/512/11821/11821370.png",
            25,
        ),
        "disk" => ("https://cdn-icons-png.flaticon.com/512/2493/2493389.png", 25),
        "storage-account" => ("https://cdn-icons-png.flaticon.com/512/1975/1975643.png", 25),
        "network-interface" => ("https://cdn-icons-png.flaticon.com/512/969/969430.png", 25),
        "public-ip-address" => ("https://cdn-icons-png.flaticon.com/512/6726/6726855.png", 25),
        "network-security-group" => {
            ("https://cdn-icons-png.flaticon.com/512/9378/9378191.png", 25)
        }
        "route-table" => ("https://cdn-icons-png.flaticon.com/512/2923/2923498.png", 25),
        "virtual-network" | "subnet" => (VNET_ICON, 25),
        _ => (
            "https://cdn-icons-png.flaticon.com/512/15549/15549062.png",
            25,
        ),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsNode {
    id: String,
    label: String,
    title: String,
    group: String,
    shape: &'static str,
    image: &'static str,
    size: u32,
    border_width: u32,
    shape_properties: serde_json::Value,
    color: serde_json::Value,
    details: NodeContext,
}

#[derive(Serialize)]
struct JsEdge {
    id: String,
    from: String,
    to: String,
    label: String,
    title: String,
    arrows: &'static str,
    dashes: bool,
    color: String,
}

#[derive(Serialize)]
struct JsGraph {
    nodes: Vec<JsNode>,
    edges: Vec<JsEdge>,
}

fn from_view(view: &GraphView) -> JsGraph {
    // palette colors are assigned per type tag in first-seen order
    let mut type_colors: BTreeMap<String, &str> = BTreeMap::new();
    let mut nodes = Vec::new();

    for node in node_contexts(view) {
        let next = PALETTE[type_colors.len() % PALETTE.len()];
        let color = *type_colors.entry(node.type_tag.clone()).or_insert(next);
        let (image, size) = icon_for(&node.kind);
        let border = match node.status.as_str() {
            "directly-exposed" => Some(EXPOSED_BORDER),
            "transitively-exposed" => Some(TRANSITIVE_BORDER),
            _ => None,
        };
        let title = if node.details.is_empty() {
            format!("{} ({})", node.name, node.type_tag)
        } else {
            format!("{} ({})\n{}", node.name, node.type_tag, node.details)
        };

        nodes.push(JsNode {
            id: node.id.clone(),
            label: node.name.clone(),
            title,
            group: node.type_tag.clone(),
            shape: "image",
            image,
            size,
            border_width: if border.is_some() { 4 } else { 1 },
            shape_properties: json!({ "useBorderWithImage": border.is_some() }),
            color: json!({
                "background": "#ffffff",
                "border": border.unwrap_or(color),
            }),
            details: node,
        });
    }

    let edges = edge_contexts(view)
        .into_iter()
        .enumerate()
        .map(|(idx, edge)| JsEdge {
            id: format!("e{}", idx),
            title: if edge.note.is_empty() {
                format!("{} ({})", edge.kind, edge.provenance)
            } else {
                format!("{} ({}): {}", edge.kind, edge.provenance, edge.note)
            },
            dashes: edge.kind == "references" || edge.kind == "same-subnet",
            color: if edge.kind == "references-rule" {
                EXPOSED_BORDER.to_string()
            } else {
                "#848484".to_string()
            },
            from: edge.source,
            to: edge.target,
            label: edge.kind,
            arrows: "to",
        })
        .collect();

    JsGraph { nodes, edges }
}

/// JSON embedded in a `<script>` block must not close it.
fn script_safe(json: String) -> String {
    json.replace("</", "<\\/")
}

/// Self-contained interactive page: vis-network with Barnes-Hut physics, a
/// per-node details panel and an exposure filter.
pub fn render(view: &GraphView, render_config: &RenderConfig) -> ImportExportResult<String> {
    let data = from_view(view);
    let config = json!({
        "name": view.name(),
        "config": render_config,
        "summary": ExposureSummary::from_nodes(view.nodes()),
    });

    let handlebars = crate::common::get_handlebars();
    let res = handlebars.render_template(
        &get_template(),
        &json!({
            "name": view.name(),
            "graphData": script_safe(serde_json::to_string_pretty(&data)?),
            "graphConfig": script_safe(serde_json::to_string_pretty(&config)?),
        }),
    )?;
    Ok(res)
}

pub fn get_template() -> String {
    include_str!("to_jsgraph.hbs").to_string()
}
