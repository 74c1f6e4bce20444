use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

use crate::errors::{GraphError, GraphResult};
use crate::pipeline::exposure::{Exposure, ExposureStatus};
use crate::resource::{Resource, ResourceKind};

/// How exposure is allowed to travel along an edge kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    None,
    /// source -> target only
    Forward,
    /// either way
    Both,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// resource group -> member
    Contains,
    /// e.g. virtual machine -> network interface
    AttachedTo,
    /// internet -> security group with an open inbound rule
    ReferencesRule,
    /// network interface <-> network interface on one subnet
    SameSubnet,
    /// plain identifier mention in another resource's properties
    References,
}

impl EdgeKind {
    pub fn propagation(&self) -> Propagation {
        match self {
            EdgeKind::Contains => Propagation::Forward,
            EdgeKind::AttachedTo | EdgeKind::SameSubnet => Propagation::Both,
            EdgeKind::ReferencesRule | EdgeKind::References => Propagation::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::AttachedTo => "attached-to",
            EdgeKind::ReferencesRule => "references-rule",
            EdgeKind::SameSubnet => "same-subnet",
            EdgeKind::References => "references",
        }
    }
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    /// Name of the heuristic that produced the edge
    pub provenance: String,
    pub note: Option<String>,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            provenance: provenance.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Identity used for de-duplication.
    pub fn key(&self) -> (&str, &str, EdgeKind) {
        (&self.source, &self.target, self.kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A resource plus the exposure annotation slot, the only part of a node
/// that changes after assembly.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    #[serde(flatten)]
    pub resource: Resource,
    exposure: Option<Exposure>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn exposure(&self) -> Option<&Exposure> {
        self.exposure.as_ref()
    }

    pub fn status(&self) -> ExposureStatus {
        self.exposure
            .as_ref()
            .map(|e| e.status)
            .unwrap_or(ExposureStatus::NotExposed)
    }
}

/// Arena of nodes indexed by identifier, with eager adjacency lists.
///
/// Everything outside the graph refers to nodes by identifier only.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    by_kind: BTreeMap<ResourceKind, Vec<usize>>,
}

impl Graph {
    /// Assembles the graph, dropping (and returning) every edge or node that
    /// would break the invariants. Fails only when there is nothing to build.
    pub fn build(
        name: impl Into<String>,
        resources: Vec<Resource>,
        edges: Vec<Edge>,
    ) -> GraphResult<(Graph, Vec<GraphError>)> {
        if resources.is_empty() {
            return Err(GraphError::EmptyResourceSet);
        }

        let mut graph = Graph {
            name: name.into(),
            ..Default::default()
        };
        let mut problems = Vec::new();

        let mut resources = resources;
        resources.sort_by(|a, b| a.id.cmp(&b.id));

        for resource in resources {
            if graph.index.contains_key(&resource.id) {
                warn!("Dropping duplicate node {}", resource.id);
                problems.push(GraphError::DuplicateNode(resource.id));
                continue;
            }
            let idx = graph.nodes.len();
            graph.index.insert(resource.id.clone(), idx);
            graph.by_kind.entry(resource.kind).or_default().push(idx);
            graph.nodes.push(Node {
                resource,
                exposure: None,
            });
        }

        let mut edges = edges;
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();

        for edge in edges {
            if edge.source == edge.target {
                warn!("Dropping self-loop on {} ({})", edge.source, edge.provenance);
                problems.push(GraphError::SelfLoop(edge.source));
                continue;
            }
            let missing = [&edge.source, &edge.target]
                .into_iter()
                .find(|id| !graph.index.contains_key(id.as_str()))
                .cloned();
            if let Some(missing) = missing {
                let err = GraphError::DanglingEdge {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing,
                };
                warn!("{} ({})", err, edge.provenance);
                problems.push(err);
                continue;
            }
            if !seen.insert((edge.source.clone(), edge.target.clone(), edge.kind)) {
                debug!(
                    "Skipping duplicate edge {} -[{}]-> {}",
                    edge.source, edge.kind, edge.target
                );
                continue;
            }
            graph.edges.push(edge);
        }

        graph.outgoing = vec![Vec::new(); graph.nodes.len()];
        graph.incoming = vec![Vec::new(); graph.nodes.len()];
        for (edge_idx, edge) in graph.edges.iter().enumerate() {
            graph.outgoing[graph.index[&edge.source]].push(edge_idx);
            graph.incoming[graph.index[&edge.target]].push(edge_idx);
        }

        info!("Graph assembled: {}", graph.stats());
        Ok((graph, problems))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.node(id).map(|n| &n.resource)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges touching `id` in the given direction, in O(degree).
    pub fn edges_of(&self, id: &str, direction: Direction) -> Vec<&Edge> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
            .then(|| self.outgoing[idx].iter())
            .into_iter()
            .flatten();
        let incoming = matches!(direction, Direction::Incoming | Direction::Both)
            .then(|| self.incoming[idx].iter())
            .into_iter()
            .flatten();
        outgoing
            .chain(incoming)
            .map(|&edge_idx| &self.edges[edge_idx])
            .collect()
    }

    /// Identifiers adjacent to `id`.
    pub fn neighbors(&self, id: &str, direction: Direction) -> BTreeSet<&str> {
        self.edges_of(id, direction)
            .into_iter()
            .map(|edge| {
                if edge.source == id {
                    edge.target.as_str()
                } else {
                    edge.source.as_str()
                }
            })
            .collect()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Node> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|&idx| &self.nodes[idx])
    }

    /// Read-only view over the nodes matching `predicate` and the edges
    /// running between them.
    pub fn filter_by<F>(&self, predicate: F) -> GraphView<'_>
    where
        F: Fn(&Node) -> bool,
    {
        let nodes: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| predicate(&self.nodes[idx]))
            .collect();
        let kept: HashSet<usize> = nodes.iter().copied().collect();
        let edges = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                kept.contains(&self.index[&e.source]) && kept.contains(&self.index[&e.target])
            })
            .map(|(idx, _)| idx)
            .collect();
        GraphView {
            graph: self,
            nodes,
            edges,
        }
    }

    /// View over the whole graph.
    pub fn view(&self) -> GraphView<'_> {
        GraphView {
            graph: self,
            nodes: (0..self.nodes.len()).collect(),
            edges: (0..self.edges.len()).collect(),
        }
    }

    /// Sets the exposure annotation of one node.
    pub fn annotate(&mut self, id: &str, exposure: Exposure) -> GraphResult<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        self.nodes[idx].exposure = Some(exposure);
        Ok(())
    }

    pub fn exposure(&self, id: &str) -> Option<&Exposure> {
        self.node(id).and_then(|n| n.exposure())
    }

    pub fn stats(&self) -> String {
        format!(
            "Nodes: {}, Edges: {}, Kinds: {}",
            self.nodes.len(),
            self.edges.len(),
            self.by_kind.len()
        )
    }

    pub fn verify_graph_integrity(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for edge in &self.edges {
            if !self.contains(&edge.source) {
                errors.push(format!(
                    "Edge {} -> {} source not found in nodes",
                    edge.source, edge.target
                ));
            }
            if !self.contains(&edge.target) {
                errors.push(format!(
                    "Edge {} -> {} target not found in nodes",
                    edge.source, edge.target
                ));
            }
            if edge.source == edge.target {
                errors.push(format!("Edge {} -> {} is a self-loop", edge.source, edge.target));
            }
        }

        self.nodes.iter().for_each(|n| {
            if n.exposure.is_none() {
                errors.push(format!("Node id:[{}] has no exposure annotation", n.id()));
            }
        });

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Filtered, borrowed projection of a [`Graph`].
#[derive(Clone, Debug)]
pub struct GraphView<'a> {
    graph: &'a Graph,
    nodes: Vec<usize>,
    edges: Vec<usize>,
}

impl<'a> GraphView<'a> {
    pub fn name(&self) -> &'a str {
        &self.graph.name
    }

    pub fn nodes(&self) -> impl Iterator<Item = &'a Node> + '_ {
        let graph = self.graph;
        self.nodes.iter().map(move |&idx| &graph.nodes[idx])
    }

    pub fn edges(&self) -> impl Iterator<Item = &'a Edge> + '_ {
        let graph = self.graph;
        self.edges.iter().map(move |&idx| &graph.edges[idx])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.graph
            .index
            .get(id)
            .is_some_and(|idx| self.nodes.binary_search(idx).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::exposure::Exposure;
    use crate::resource::PropertyBag;

    fn resource(id: &str, kind: ResourceKind) -> Resource {
        Resource {
            id: id.to_string(),
            type_tag: kind.as_str().to_string(),
            kind,
            name: id.to_string(),
            resource_group: String::new(),
            power_state: None,
            properties: PropertyBag::new(),
        }
    }

    fn create_test_graph() -> (Graph, Vec<GraphError>) {
        Graph::build(
            "test",
            vec![
                resource("vm1", ResourceKind::VirtualMachine),
                resource("nic1", ResourceKind::NetworkInterface),
                resource("nsg1", ResourceKind::NetworkSecurityGroup),
            ],
            vec![
                Edge::new("vm1", "nic1", EdgeKind::AttachedTo, "network-attachment"),
                Edge::new("nic1", "nsg1", EdgeKind::AttachedTo, "network-attachment"),
                Edge::new("vm1", "ghost", EdgeKind::AttachedTo, "network-attachment"),
                Edge::new("vm1", "vm1", EdgeKind::References, "id-reference"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_rejects_empty_input() {
        let err = Graph::build("empty", Vec::new(), Vec::new()).unwrap_err();
        assert_eq!(err, GraphError::EmptyResourceSet);
    }

    #[test]
    fn test_build_drops_dangling_edges_and_self_loops() {
        let (graph, problems) = create_test_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(problems.len(), 2);
        assert!(problems
            .iter()
            .any(|p| matches!(p, GraphError::DanglingEdge { missing, .. } if missing == "ghost")));
        assert!(problems.contains(&GraphError::SelfLoop("vm1".to_string())));
    }

    #[test]
    fn test_build_skips_duplicate_nodes() {
        let (graph, problems) = Graph::build(
            "dups",
            vec![
                resource("a", ResourceKind::Other),
                resource("a", ResourceKind::Disk),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(problems, vec![GraphError::DuplicateNode("a".to_string())]);
    }

    #[test]
    fn test_neighbors() {
        let (graph, _) = create_test_graph();
        let out: Vec<&str> = graph.neighbors("nic1", Direction::Outgoing).into_iter().collect();
        assert_eq!(out, vec!["nsg1"]);
        let inc: Vec<&str> = graph.neighbors("nic1", Direction::Incoming).into_iter().collect();
        assert_eq!(inc, vec!["vm1"]);
        assert_eq!(graph.neighbors("nic1", Direction::Both).len(), 2);
        assert!(graph.neighbors("missing", Direction::Both).is_empty());
    }

    #[test]
    fn test_nodes_of_kind() {
        let (graph, _) = create_test_graph();
        let nics: Vec<&str> = graph
            .nodes_of_kind(ResourceKind::NetworkInterface)
            .map(|n| n.id())
            .collect();
        assert_eq!(nics, vec!["nic1"]);
        assert_eq!(graph.nodes_of_kind(ResourceKind::Disk).count(), 0);
    }

    #[test]
    fn test_filter_by_keeps_only_inner_edges() {
        let (graph, _) = create_test_graph();
        let view = graph.filter_by(|n| n.id() != "vm1");
        assert_eq!(view.node_count(), 2);
        assert_eq!(view.edge_count(), 1);
        assert!(view.contains("nic1"));
        assert!(!view.contains("vm1"));
        let edge = view.edges().next().unwrap();
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("nic1", "nsg1"));
    }

    #[test]
    fn test_annotate_and_integrity() {
        let (mut graph, _) = create_test_graph();
        assert!(graph.verify_graph_integrity().is_err());
        for id in ["vm1", "nic1", "nsg1"] {
            graph.annotate(id, Exposure::not_exposed()).unwrap();
        }
        assert!(graph.verify_graph_integrity().is_ok());
        assert!(graph.annotate("ghost", Exposure::not_exposed()).is_err());
        assert_eq!(graph.node("vm1").unwrap().status(), ExposureStatus::NotExposed);
    }
}
