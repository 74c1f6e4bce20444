pub mod to_csv_edges;
pub mod to_csv_nodes;
pub mod to_custom;
pub mod to_dot;
pub mod to_jsgraph;
pub mod to_json;

use crate::graph::{Graph, GraphView};
use crate::plan::GraphConfig;

/// Applies the profile's graph config: the projection every exporter sees.
pub fn project<'a>(graph: &'a Graph, graph_config: &GraphConfig) -> GraphView<'a> {
    let exposed_only = graph_config.exposed_only;
    let include_internet = graph_config.include_internet;
    graph.filter_by(|node| {
        if node.resource.is_synthetic() {
            return include_internet;
        }
        !exposed_only || node.status().is_exposed()
    })
}

/// Common rendering function used by all template-based exporters
pub mod renderer {
    use crate::errors::ImportExportResult;
    use crate::graph::{Edge, GraphView, Node};
    use crate::pipeline::exposure::ExposureSummary;
    use crate::plan::RenderConfig;
    use indexmap::IndexMap;
    use serde::Serialize;
    use serde_json::{json, Value};

    /// Flat, template-friendly shape of one node.
    #[derive(Serialize, Clone, Debug)]
    pub struct NodeContext {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub type_tag: String,
        pub kind: String,
        pub resource_group: String,
        pub power_state: String,
        pub status: String,
        pub evidence: Vec<String>,
        pub details: String,
        pub properties: IndexMap<String, String>,
    }

    impl From<&Node> for NodeContext {
        fn from(node: &Node) -> Self {
            let resource = &node.resource;
            let evidence: Vec<String> = node
                .exposure()
                .map(|e| e.evidence.iter().map(|ev| ev.to_string()).collect())
                .unwrap_or_default();
            Self {
                id: resource.id.clone(),
                name: resource.name.clone(),
                type_tag: resource.type_tag.clone(),
                kind: resource.kind.to_string(),
                resource_group: resource.resource_group.clone(),
                power_state: resource
                    .power_state
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                status: node.status().to_string(),
                details: evidence.join("; "),
                evidence,
                properties: resource
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }
        }
    }

    #[derive(Serialize, Clone, Debug)]
    pub struct EdgeContext {
        pub source: String,
        pub target: String,
        pub kind: String,
        pub provenance: String,
        pub note: String,
    }

    impl From<&Edge> for EdgeContext {
        fn from(edge: &Edge) -> Self {
            Self {
                source: edge.source.clone(),
                target: edge.target.clone(),
                kind: edge.kind.to_string(),
                provenance: edge.provenance.clone(),
                note: edge.note.clone().unwrap_or_default(),
            }
        }
    }

    pub fn node_contexts(view: &GraphView) -> Vec<NodeContext> {
        view.nodes().map(NodeContext::from).collect()
    }

    pub fn edge_contexts(view: &GraphView) -> Vec<EdgeContext> {
        view.edges().map(EdgeContext::from).collect()
    }

    /// Creates the context object every template receives
    pub fn create_standard_context(view: &GraphView, render_config: &RenderConfig) -> Value {
        json!({
            "graph_name": view.name(),
            "config": render_config,
            "nodes": node_contexts(view),
            "edges": edge_contexts(view),
            "summary": ExposureSummary::from_nodes(view.nodes()),
        })
    }

    /// Standard rendering function for template-based exports
    pub fn render_template(
        view: &GraphView,
        render_config: &RenderConfig,
        template: &str,
    ) -> ImportExportResult<String> {
        let handlebars = crate::common::get_handlebars();
        let context = create_standard_context(view, render_config);
        Ok(handlebars.render_template(template, &context)?)
    }
}
