use crate::errors::ImportExportResult;
use crate::graph::GraphView;
use crate::plan::RenderConfig;

pub fn render(view: &GraphView, render_config: &RenderConfig) -> ImportExportResult<String> {
    super::renderer::render_template(view, render_config, &get_template())
}

pub fn get_template() -> String {
    include_str!("to_dot.hbs").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::exposed_vm_graph;
    use crate::plan::RenderConfigOrientation;

    #[test]
    fn test_dot_marks_exposure() {
        let graph = exposed_vm_graph();
        let config = RenderConfig {
            orientation: RenderConfigOrientation::TB,
            physics: false,
        };
        let rendered = render(&graph.view(), &config).unwrap();

        assert!(rendered.starts_with("digraph \"fixture\" {"));
        assert!(rendered.contains("rankdir=\"TB\";"));
        assert!(rendered.contains(r##""vm1" [label="web \"01\"\nvirtual-machine", fillcolor="#fce5cd""##));
        assert!(rendered.contains(r##""nsg1" [label="nsg1\nsecurity-group", fillcolor="#f4cccc""##));
        assert!(rendered.contains(r#""nic1" -> "nsg1" [label="attached-to"];"#));
        assert!(rendered.contains(r##""internet" -> "nsg1" [label="references-rule", color="#cc0000""##));
    }
}
