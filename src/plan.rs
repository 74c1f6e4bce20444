use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::pipeline::exposure_rules::ExposureRuleSet;
use crate::pipeline::normalizer::ColumnMapping;

/// ## Structure
/// This module contains the data structures for the plan file.
///
/// ```text
/// Plan
///   ├── meta: Option<Meta>
///   │   └── name: Option<String>
///   ├── import: ImportConfig
///   │   ├── filename: String
///   │   └── columns: ColumnMapping
///   ├── exposure: ExposureRuleSet
///   │   └── rules: Vec<ExposureRule>
///   └── export: ExportProfile
///       └── profiles: Vec<ExportProfileItem>
///           ├── filename: String
///           ├── exporter: ExportFileType
///           │   ├── JSON
///           │   ├── HTML
///           │   ├── DOT
///           │   ├── CSVNodes
///           │   ├── CSVEdges
///           │   └── Custom(CustomExportProfile)
///           ├── render_config: Option<ExportProfileRenderConfig>
///           └── graph_config: Option<ExportProfileGraphConfig>
///               └── exposed_only: Option<bool>
/// ```

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Plan {
    pub meta: Option<Meta>,
    pub import: ImportConfig,
    #[serde(default)]
    pub exposure: ExposureRuleSet,
    pub export: ExportProfile,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            meta: Some(Meta {
                name: Some("azure".to_string()),
            }),
            import: ImportConfig::default(),
            exposure: ExposureRuleSet::default(),
            export: ExportProfile {
                profiles: vec![
                    ExportProfileItem::new("out/azure_graph.html", ExportFileType::HTML),
                    ExportProfileItem::new("out/azure_graph.json", ExportFileType::JSON),
                ],
            },
        }
    }
}

impl Plan {
    pub fn name(&self) -> String {
        self.meta
            .as_ref()
            .and_then(|meta| meta.name.clone())
            .unwrap_or_else(|| "Unnamed Graph".to_string())
    }
}

//
// Import configuration
//

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImportConfig {
    pub filename: String,
    #[serde(default)]
    pub columns: ColumnMapping,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            filename: "azure_resources.csv".to_string(),
            columns: ColumnMapping::default(),
        }
    }
}

//
// Export configuration
//

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExportProfile {
    pub profiles: Vec<ExportProfileItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExportProfileItem {
    pub filename: String,
    pub exporter: ExportFileType,
    pub render_config: Option<ExportProfileRenderConfig>,
    pub graph_config: Option<ExportProfileGraphConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Copy, Default)]
pub struct ExportProfileGraphConfig {
    pub exposed_only: Option<bool>,
    pub include_internet: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Copy, Default)]
pub struct ExportProfileRenderConfig {
    pub orientation: Option<RenderConfigOrientation>,
    pub physics: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Copy, PartialEq, Eq)]
pub enum RenderConfigOrientation {
    LR,
    TB,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomExportProfile {
    pub template: String,
    pub partials: Option<HashMap<String, String>>,
}

impl CustomExportProfile {
    /// Same profile with the template and partial paths joined onto `base`.
    /// Absolute paths are left as they are.
    pub fn relative_to(&self, base: &Path) -> Self {
        let join = |path: &str| base.join(path).to_string_lossy().into_owned();
        Self {
            template: join(&self.template),
            partials: self.partials.as_ref().map(|partials| {
                partials
                    .iter()
                    .map(|(name, path)| (name.clone(), join(path)))
                    .collect()
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ExportFileType {
    JSON,
    HTML,
    DOT,
    CSVNodes,
    CSVEdges,
    Custom(CustomExportProfile),
}

#[derive(Serialize, Deserialize, Clone, Debug, Copy)]
pub struct RenderConfig {
    pub orientation: RenderConfigOrientation,
    pub physics: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            orientation: RenderConfigOrientation::LR,
            physics: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Copy)]
pub struct GraphConfig {
    pub exposed_only: bool,
    pub include_internet: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            exposed_only: false,
            include_internet: true,
        }
    }
}

impl ExportProfileItem {
    pub fn new(filename: impl Into<String>, exporter: ExportFileType) -> Self {
        Self {
            filename: filename.into(),
            exporter,
            render_config: None,
            graph_config: None,
        }
    }

    pub fn get_graph_config(&self) -> GraphConfig {
        let graph_config = self.graph_config.unwrap_or_default();
        let defaults = GraphConfig::default();

        GraphConfig {
            exposed_only: graph_config.exposed_only.unwrap_or(defaults.exposed_only),
            include_internet: graph_config
                .include_internet
                .unwrap_or(defaults.include_internet),
        }
    }

    pub fn get_render_config(&self) -> RenderConfig {
        let render_config = self.render_config.unwrap_or_default();
        let defaults = RenderConfig::default();

        RenderConfig {
            orientation: render_config.orientation.unwrap_or(defaults.orientation),
            physics: render_config.physics.unwrap_or(defaults.physics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_round_trips_through_yaml() {
        let yaml_str = serde_yaml::to_string(&Plan::default()).unwrap();
        assert!(yaml_str.contains("azure_resources.csv"));
        assert!(yaml_str.contains("nsg-open-inbound"));

        let plan: Plan = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(plan.name(), "azure");
        assert_eq!(plan.export.profiles.len(), 2);
        assert_eq!(plan.exposure, ExposureRuleSet::default());
    }

    #[test]
    fn test_planfile_deserialization() {
        let yaml_str = r#"
meta:
  name: prod
import:
  filename: export.tsv
  columns:
    id: ResourceId
export:
  profiles:
    - filename: out/graph.html
      exporter: HTML
    - filename: out/exposed.dot
      exporter: DOT
      graph_config:
        exposed_only: true
      render_config:
        orientation: TB
    - filename: out/nodes.csv
      exporter: CSVNodes
    - filename: out/edges.csv
      exporter: CSVEdges
    - filename: out/custom.md
      exporter: !Custom
        template: report.hbs
"#;

        let plan: Plan = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(plan.name(), "prod");
        assert_eq!(plan.import.columns.id, "ResourceId");
        assert_eq!(plan.import.columns.type_tag, "type");
        assert_eq!(plan.exposure, ExposureRuleSet::default());
        assert_eq!(plan.export.profiles.len(), 5);

        let dot = &plan.export.profiles[1];
        assert!(dot.get_graph_config().exposed_only);
        assert!(dot.get_graph_config().include_internet);
        assert_eq!(dot.get_render_config().orientation, RenderConfigOrientation::TB);
        assert!(matches!(
            &plan.export.profiles[4].exporter,
            ExportFileType::Custom(custom) if custom.template == "report.hbs"
        ));
    }

    #[test]
    fn test_custom_paths_relative_to_plan_dir() {
        let custom = CustomExportProfile {
            template: "templates/report.hbs".to_string(),
            partials: Some(HashMap::from([
                ("row".to_string(), "templates/row.hbs".to_string()),
                ("abs".to_string(), "/etc/azgraph/abs.hbs".to_string()),
            ])),
        };
        let resolved = custom.relative_to(Path::new("/work/project"));
        assert_eq!(resolved.template, "/work/project/templates/report.hbs");
        let partials = resolved.partials.unwrap();
        assert_eq!(partials["row"], "/work/project/templates/row.hbs");
        assert_eq!(partials["abs"], "/etc/azgraph/abs.hbs");

        let unchanged = custom.relative_to(Path::new(""));
        assert_eq!(unchanged.template, "templates/report.hbs");
    }

    #[test]
    fn test_unnamed_plan() {
        let yaml_str = r#"
import:
  filename: a.csv
export:
  profiles: []
"#;
        let plan: Plan = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(plan.name(), "Unnamed Graph");
    }
}
