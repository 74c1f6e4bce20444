use crate::errors::ImportExportResult;
use crate::export::renderer::node_contexts;
use crate::graph::GraphView;
use crate::plan::RenderConfig;
use csv::Writer;

pub fn render(view: &GraphView, _render_config: &RenderConfig) -> ImportExportResult<String> {
    let mut wtr = Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "name",
        "type",
        "kind",
        "resource_group",
        "power_state",
        "status",
        "evidence",
    ])?;

    for node in node_contexts(view) {
        wtr.write_record(&[
            node.id,
            node.name,
            node.type_tag,
            node.kind,
            node.resource_group,
            node.power_state,
            node.status,
            node.details,
        ])?;
    }

    let data = wtr.into_inner()?;
    Ok(String::from_utf8(data)?)
}
