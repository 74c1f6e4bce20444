use crate::errors::ImportExportResult;
use crate::graph::GraphView;
use crate::pipeline::exposure::ExposureSummary;
use crate::plan::RenderConfig;
use serde_json::json;

/// Full annotated graph: resources with their exposure, edges with provenance.
pub fn render(view: &GraphView, _render_config: &RenderConfig) -> ImportExportResult<String> {
    let nodes: Vec<_> = view.nodes().collect();
    let edges: Vec<_> = view.edges().collect();
    let res = json!({
        "name": view.name(),
        "summary": ExposureSummary::from_nodes(view.nodes()),
        "nodes": nodes,
        "edges": edges,
    });
    Ok(serde_json::to_string_pretty(&res)?)
}
