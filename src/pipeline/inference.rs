use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::graph::{Edge, EdgeKind};
use crate::pipeline::exposure_rules::ExposureRuleSet;
use crate::pipeline::heuristics::{
    Containment, IdReference, NetworkAttachment, RuleReference, SameSubnet,
};
use crate::resource::Resource;

/// A relationship inference rule.
///
/// Heuristics see the whole normalized resource set, never each other's
/// output. An edge whose endpoints are missing from the set is dropped at
/// graph assembly, so a heuristic may name endpoints optimistically.
pub trait Heuristic: Send + Sync {
    /// Stable name, recorded as the provenance of every edge produced
    fn name(&self) -> &'static str;

    fn infer(&self, resources: &[Resource]) -> Vec<Edge>;
}

/// Runs a list of heuristics and merges their output.
pub struct InferenceEngine {
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::for_rules(&ExposureRuleSet::default())
    }
}

impl InferenceEngine {
    /// The standard heuristics, with internet-to-security-group edges drawn
    /// for the same rule sources that `rules` treats as open.
    pub fn for_rules(rules: &ExposureRuleSet) -> Self {
        Self::empty()
            .with_heuristic(Containment)
            .with_heuristic(NetworkAttachment::default())
            .with_heuristic(RuleReference {
                sources: rules.open_sources(),
            })
            .with_heuristic(SameSubnet)
            .with_heuristic(IdReference::default())
    }

    pub fn empty() -> Self {
        Self {
            heuristics: Vec::new(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: impl Heuristic + 'static) -> Self {
        self.heuristics.push(Box::new(heuristic));
        self
    }

    pub fn heuristic_names(&self) -> Vec<&'static str> {
        self.heuristics.iter().map(|h| h.name()).collect()
    }

    /// Heuristics run in parallel; merging is sequential in registration
    /// order, so when two heuristics produce the same (source, target, kind)
    /// the first registered one keeps its provenance. Self-loops are dropped.
    pub fn infer_edges(&self, resources: &[Resource]) -> Vec<Edge> {
        let produced: Vec<(&'static str, Vec<Edge>)> = self
            .heuristics
            .par_iter()
            .map(|h| (h.name(), h.infer(resources)))
            .collect();

        let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
        let mut edges = Vec::new();
        for (name, batch) in produced {
            let before = edges.len();
            let total = batch.len();
            for edge in batch {
                if edge.source == edge.target {
                    debug!("{} produced a self-loop on {}, dropping", name, edge.source);
                    continue;
                }
                if seen.insert((edge.source.clone(), edge.target.clone(), edge.kind)) {
                    edges.push(edge);
                }
            }
            debug!(
                "Heuristic {} produced {} edges ({} new)",
                name,
                total,
                edges.len() - before
            );
        }

        info!(
            "Inferred {} edges from {} resources",
            edges.len(),
            resources.len()
        );
        edges
    }
}

/// Runs the standard heuristic set.
pub fn infer_edges(resources: &[Resource]) -> Vec<Edge> {
    InferenceEngine::default().infer_edges(resources)
}
