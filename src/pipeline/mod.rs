//! Record export -> annotated relationship graph.
//!
//! ```text
//! records -> normalizer -> inference -> Graph::build -> exposure
//! ```

pub mod exposure;
pub mod exposure_rules;
pub mod heuristics;
pub mod inference;
pub mod normalizer;
pub mod security_rules;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{GraphError, GraphResult, RecordError};
use crate::graph::Graph;
use crate::resource::{Record, Resource, INTERNET_NODE_ID};
use exposure::ExposureSummary;
use exposure_rules::ExposureRuleSet;
use inference::InferenceEngine;
use normalizer::{normalize_all, ColumnMapping};

/// What happened to the items that did not make it into the graph.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct PipelineReport {
    pub records: usize,
    #[serde(serialize_with = "as_strings")]
    pub rejected: Vec<RecordError>,
    #[serde(serialize_with = "as_strings")]
    pub dropped: Vec<GraphError>,
    pub summary: ExposureSummary,
}

#[allow(clippy::ptr_arg)]
fn as_strings<S, E>(items: &Vec<E>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    E: ToString,
{
    serializer.collect_seq(items.iter().map(|e| e.to_string()))
}

impl PipelineReport {
    pub fn duplicate_identifiers(&self) -> impl Iterator<Item = &RecordError> {
        self.rejected
            .iter()
            .filter(|e| matches!(e, RecordError::DuplicateIdentifier { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.dropped.is_empty()
    }
}

/// The configured pipeline: column mapping, heuristics and exposure rules.
pub struct Pipeline {
    pub columns: ColumnMapping,
    pub rules: ExposureRuleSet,
    pub engine: InferenceEngine,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ColumnMapping::default(), ExposureRuleSet::default())
    }
}

impl Pipeline {
    pub fn new(columns: ColumnMapping, rules: ExposureRuleSet) -> Self {
        let engine = InferenceEngine::for_rules(&rules);
        Self {
            columns,
            rules,
            engine,
        }
    }

    pub fn with_engine(mut self, engine: InferenceEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Builds and classifies the graph. Fails only when no record survives
    /// normalization.
    pub fn run(&self, name: &str, records: &[Record]) -> GraphResult<(Graph, PipelineReport)> {
        info!("Running pipeline '{}' over {} records", name, records.len());
        let outcome = normalize_all(records, &self.columns);
        let mut resources = outcome.resources;
        if resources.is_empty() {
            return Err(GraphError::EmptyResourceSet);
        }

        let edges = self.engine.infer_edges(&resources);
        let needs_internet = edges
            .iter()
            .any(|e| e.source == INTERNET_NODE_ID || e.target == INTERNET_NODE_ID);
        if needs_internet && !resources.iter().any(|r| r.id == INTERNET_NODE_ID) {
            resources.push(Resource::internet());
        }

        let (mut graph, dropped) = Graph::build(name, resources, edges)?;
        if !dropped.is_empty() {
            warn!("{} edges or nodes dropped during assembly", dropped.len());
        }

        let summary = exposure::classify(&mut graph, &self.rules);
        Ok((
            graph,
            PipelineReport {
                records: records.len(),
                rejected: outcome.rejected,
                dropped,
                summary,
            },
        ))
    }
}

/// Runs the standard pipeline with the given column mapping and rules.
pub fn run(
    name: &str,
    records: &[Record],
    columns: &ColumnMapping,
    rules: &ExposureRuleSet,
) -> GraphResult<(Graph, PipelineReport)> {
    Pipeline::new(columns.clone(), rules.clone()).run(name, records)
}
