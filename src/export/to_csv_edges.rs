use crate::errors::ImportExportResult;
use crate::export::renderer::edge_contexts;
use crate::graph::GraphView;
use crate::plan::RenderConfig;
use csv::Writer;

pub fn render(view: &GraphView, _render_config: &RenderConfig) -> ImportExportResult<String> {
    let mut wtr = Writer::from_writer(vec![]);

    wtr.write_record(["source", "target", "kind", "provenance", "note"])?;

    for edge in edge_contexts(view) {
        wtr.write_record(&[edge.source, edge.target, edge.kind, edge.provenance, edge.note])?;
    }

    let data = wtr.into_inner()?;
    Ok(String::from_utf8(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::exposed_vm_graph;

    #[test]
    fn test_edges_csv() {
        let graph = exposed_vm_graph();
        let rendered = render(&graph.view(), &RenderConfig::default()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "source,target,kind,provenance,note");
        assert!(lines.contains(&"nic1,nsg1,attached-to,network-attachment,"));
        assert!(lines.contains(&"vm1,nic1,attached-to,network-attachment,"));
        assert!(lines.contains(&"internet,nsg1,references-rule,rule-reference,ssh allows inbound from Internet"));
    }
}
