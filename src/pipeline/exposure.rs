//! Internet-exposure classification.
//!
//! Classification runs in two phases over an assembled [`Graph`]:
//!
//! 1. every resource is matched against the exposure rule set on its own
//!    properties; a match makes it directly exposed
//! 2. exposure spreads from the directly exposed resources along
//!    propagating edges, at most [`HOP_BOUND`] hops, turning not exposed
//!    resources into transitively exposed ones
//!
//! Statuses only ever move up the order
//! `NotExposed < TransitivelyExposed < DirectlyExposed`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

use crate::graph::{Direction, EdgeKind, Graph, Node, Propagation};
use crate::pipeline::exposure_rules::ExposureRuleSet;
use crate::resource::Resource;

/// Maximum number of edges between a transitively exposed resource and the
/// directly exposed resource it inherits from.
pub const HOP_BOUND: usize = 2;

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureStatus {
    #[default]
    NotExposed,
    TransitivelyExposed,
    DirectlyExposed,
}

impl ExposureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureStatus::NotExposed => "not-exposed",
            ExposureStatus::TransitivelyExposed => "transitively-exposed",
            ExposureStatus::DirectlyExposed => "directly-exposed",
        }
    }

    pub fn is_exposed(&self) -> bool {
        *self != ExposureStatus::NotExposed
    }
}

impl Display for ExposureStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One traversed edge, written in traversal order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EvidenceHop {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Why a resource carries its status.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Evidence {
    /// A property matched an exposure rule
    Property {
        rule: String,
        path: String,
        value: String,
    },
    /// An inbound allow rule opens the resource to the internet
    SecurityRule {
        rule: String,
        security_rule: String,
        source: String,
    },
    /// Exposure inherited from `origin` along `hops`
    Path { origin: String, hops: Vec<EvidenceHop> },
}

impl Display for Evidence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Evidence::Property { rule, path, value } => {
                write!(f, "{}: {} = {}", rule, path, value)
            }
            Evidence::SecurityRule {
                rule,
                security_rule,
                source,
            } => write!(f, "{}: rule '{}' allows inbound from {}", rule, security_rule, source),
            Evidence::Path { origin, hops } => {
                write!(f, "via {}", origin)?;
                for hop in hops {
                    write!(f, " -[{}]-> {}", hop.kind, hop.to)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Exposure {
    pub status: ExposureStatus,
    pub evidence: Vec<Evidence>,
}

impl Exposure {
    pub fn not_exposed() -> Self {
        Self::default()
    }

    pub fn direct(evidence: Vec<Evidence>) -> Self {
        Self {
            status: ExposureStatus::DirectlyExposed,
            evidence,
        }
    }

    pub fn transitive(origin: impl Into<String>, hops: Vec<EvidenceHop>) -> Self {
        Self {
            status: ExposureStatus::TransitivelyExposed,
            evidence: vec![Evidence::Path {
                origin: origin.into(),
                hops,
            }],
        }
    }

    /// Evidence joined into one line, for renderers.
    pub fn describe(&self) -> String {
        self.evidence
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Counts per status after classification.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExposureSummary {
    pub direct: usize,
    pub transitive: usize,
    pub not_exposed: usize,
}

impl ExposureSummary {
    pub fn of(graph: &Graph) -> Self {
        Self::from_nodes(graph.nodes())
    }

    /// Counts over any node selection; synthetic nodes are skipped.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        nodes
            .into_iter()
            .filter(|n| !n.resource.is_synthetic())
            .fold(Self::default(), |mut summary, node| {
                match node.status() {
                    ExposureStatus::DirectlyExposed => summary.direct += 1,
                    ExposureStatus::TransitivelyExposed => summary.transitive += 1,
                    ExposureStatus::NotExposed => summary.not_exposed += 1,
                }
                summary
            })
    }

    pub fn exposed(&self) -> usize {
        self.direct + self.transitive
    }
}

impl Display for ExposureSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Directly exposed: {}, Transitively exposed: {}, Not exposed: {}",
            self.direct, self.transitive, self.not_exposed
        )
    }
}

/// Phase 1 for a single resource.
pub fn classify_direct(resource: &Resource, rules: &ExposureRuleSet) -> Exposure {
    if resource.is_synthetic() {
        return Exposure::not_exposed();
    }
    let evidence = rules.evaluate(resource);
    if evidence.is_empty() {
        Exposure::not_exposed()
    } else {
        Exposure::direct(evidence)
    }
}

/// Runs both phases, annotating every node of `graph`.
pub fn classify(graph: &mut Graph, rules: &ExposureRuleSet) -> ExposureSummary {
    let direct: Vec<(String, Exposure)> = graph
        .nodes()
        .par_iter()
        .map(|node| (node.id().to_string(), classify_direct(&node.resource, rules)))
        .collect();

    for (id, exposure) in direct {
        if exposure.status.is_exposed() {
            debug!("{} directly exposed: {}", id, exposure.describe());
        }
        upgrade(graph, &id, exposure);
    }

    let upgraded = propagate(graph);
    let summary = ExposureSummary::of(graph);
    info!(
        "Exposure classified: {} ({} reached by propagation)",
        summary, upgraded
    );
    summary
}

/// Neighbors reachable from `id` in one propagating step, sorted by
/// identifier. When several edges lead to the same neighbor the lowest
/// edge kind wins.
fn propagation_steps(graph: &Graph, id: &str) -> Vec<(String, EdgeKind)> {
    let mut steps: Vec<(String, EdgeKind)> = graph
        .edges_of(id, Direction::Both)
        .into_iter()
        .filter_map(|edge| {
            let outgoing = edge.source == id;
            match (edge.kind.propagation(), outgoing) {
                (Propagation::None, _) | (Propagation::Forward, false) => None,
                (_, true) => Some((edge.target.clone(), edge.kind)),
                (Propagation::Both, false) => Some((edge.source.clone(), edge.kind)),
            }
        })
        .collect();
    steps.sort();
    steps.dedup_by(|a, b| a.0 == b.0);
    steps
}

/// Phase 2: multi-source breadth-first search from every directly exposed
/// node. Sources are seeded in identifier order, so a node reachable from
/// several sources at the same distance inherits from the lowest one.
/// Returns the number of nodes upgraded.
pub fn propagate(graph: &mut Graph) -> usize {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String, Vec<EvidenceHop>)> = VecDeque::new();

    for node in graph.nodes() {
        if node.status() == ExposureStatus::DirectlyExposed {
            visited.insert(node.id().to_string());
            queue.push_back((node.id().to_string(), node.id().to_string(), Vec::new()));
        }
    }

    let mut upgrades: Vec<(String, Exposure)> = Vec::new();
    while let Some((id, origin, hops)) = queue.pop_front() {
        if hops.len() >= HOP_BOUND {
            continue;
        }
        for (neighbor, kind) in propagation_steps(graph, &id) {
            if !visited.insert(neighbor.clone()) {
                continue;
            }
            let Some(node) = graph.node(&neighbor) else {
                continue;
            };
            if node.resource.is_synthetic() {
                continue;
            }

            let mut path = hops.clone();
            path.push(EvidenceHop {
                from: id.clone(),
                to: neighbor.clone(),
                kind,
            });
            if node.status() == ExposureStatus::NotExposed {
                upgrades.push((neighbor.clone(), Exposure::transitive(&origin, path.clone())));
            }
            queue.push_back((neighbor, origin.clone(), path));
        }
    }

    let count = upgrades.len();
    for (id, exposure) in upgrades {
        upgrade(graph, &id, exposure);
    }
    count
}

/// Writes `exposure` unless the node already holds a higher status.
fn upgrade(graph: &mut Graph, id: &str, exposure: Exposure) {
    let current = graph.exposure(id).map(|e| e.status);
    if current.is_some_and(|status| status >= exposure.status) {
        return;
    }
    if let Err(err) = graph.annotate(id, exposure) {
        warn!("Cannot annotate node: {}", err);
    }
}
