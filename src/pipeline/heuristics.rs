//! The standard relationship heuristics.

use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::{Edge, EdgeKind};
use crate::pipeline::inference::Heuristic;
use crate::pipeline::security_rules::{rules_of, INTERNET_SOURCES};
use crate::resource::{Resource, ResourceKind, INTERNET_NODE_ID};

fn by_kind(resources: &[Resource]) -> HashMap<ResourceKind, Vec<&Resource>> {
    let mut map: HashMap<ResourceKind, Vec<&Resource>> = HashMap::new();
    for resource in resources {
        map.entry(resource.kind).or_default().push(resource);
    }
    map
}

/// Resource group -> every resource naming that group.
pub struct Containment;

impl Heuristic for Containment {
    fn name(&self) -> &'static str {
        "containment"
    }

    fn infer(&self, resources: &[Resource]) -> Vec<Edge> {
        // lowest identifier wins when two groups share a name
        let mut groups: BTreeMap<String, &str> = BTreeMap::new();
        for resource in resources {
            if let Some(key) = resource.group_key() {
                groups
                    .entry(key)
                    .and_modify(|id| {
                        if resource.id.as_str() < *id {
                            *id = resource.id.as_str();
                        }
                    })
                    .or_insert(resource.id.as_str());
            }
        }

        resources
            .iter()
            .filter(|r| !r.resource_group.is_empty())
            .filter_map(|r| {
                let group_id = groups.get(&r.resource_group.to_ascii_lowercase())?;
                (*group_id != r.id).then(|| {
                    Edge::new(*group_id, r.id.as_str(), EdgeKind::Contains, self.name())
                        .with_note(format!("resource group {}", r.resource_group))
                })
            })
            .collect()
    }
}

/// Kind pairs that attach to each other when the first one mentions the
/// second one's identifier.
pub struct NetworkAttachment {
    pub pairs: Vec<(ResourceKind, ResourceKind)>,
}

impl Default for NetworkAttachment {
    fn default() -> Self {
        use ResourceKind::*;
        Self {
            pairs: vec![
                (VirtualMachine, NetworkInterface),
                (VirtualMachine, Disk),
                (VmExtension, VirtualMachine),
                (NetworkInterface, NetworkSecurityGroup),
                (NetworkInterface, PublicIpAddress),
                (NetworkInterface, Subnet),
                (Subnet, NetworkSecurityGroup),
                (Subnet, RouteTable),
            ],
        }
    }
}

impl Heuristic for NetworkAttachment {
    fn name(&self) -> &'static str {
        "network-attachment"
    }

    fn infer(&self, resources: &[Resource]) -> Vec<Edge> {
        let kinds = by_kind(resources);
        let mut edges = Vec::new();
        for (from, to) in &self.pairs {
            let (Some(sources), Some(targets)) = (kinds.get(from), kinds.get(to)) else {
                continue;
            };
            let needles: Vec<String> = targets
                .iter()
                .map(|t| t.id.to_ascii_lowercase())
                .collect();
            for source in sources {
                let text = source.properties.search_text(None);
                for (target, needle) in targets.iter().zip(&needles) {
                    if source.id != target.id && text.mentions(needle) {
                        edges.push(Edge::new(
                            source.id.as_str(),
                            target.id.as_str(),
                            EdgeKind::AttachedTo,
                            self.name(),
                        ));
                    }
                }
            }
        }
        edges
    }
}

/// Internet -> security group, for every group with an inbound allow rule
/// whose source is open to the internet. The rule name becomes the note.
pub struct RuleReference {
    pub sources: Vec<String>,
}

impl Default for RuleReference {
    fn default() -> Self {
        Self {
            sources: INTERNET_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Heuristic for RuleReference {
    fn name(&self) -> &'static str {
        "rule-reference"
    }

    fn infer(&self, resources: &[Resource]) -> Vec<Edge> {
        resources
            .iter()
            .filter(|r| r.kind == ResourceKind::NetworkSecurityGroup)
            .filter_map(|nsg| {
                rules_of(nsg).into_iter().find_map(|rule| {
                    let source = rule.exposes_to(self.sources.as_slice())?;
                    Some(
                        Edge::new(
                            INTERNET_NODE_ID,
                            nsg.id.as_str(),
                            EdgeKind::ReferencesRule,
                            self.name(),
                        )
                        .with_note(format!("{} allows inbound from {}", rule.name, source)),
                    )
                })
            })
            .collect()
    }
}

/// Network interfaces sharing a subnet, connected pairwise from the lower
/// identifier to the higher.
pub struct SameSubnet;

const SUBNET_ID_COLUMNS: [&str; 2] = ["subnetId", "subnet_id"];

fn subnets_of(resource: &Resource) -> BTreeSet<String> {
    let mut subnets: BTreeSet<String> = SUBNET_ID_COLUMNS
        .iter()
        .filter_map(|column| resource.properties.get(column))
        .map(str::to_ascii_lowercase)
        .collect();

    // a bare `subnet` column often holds a display name such as `default`
    if let Some(subnet) = resource.properties.get("subnet") {
        let subnet = subnet.to_ascii_lowercase();
        if subnet.contains("/subnets/") {
            subnets.insert(subnet);
        }
    }

    if let Some(Value::Array(configs)) = resource
        .properties
        .lookup_value("properties.ipConfigurations")
    {
        for config in &configs {
            let subnet = config
                .pointer("/properties/subnet/id")
                .or_else(|| config.pointer("/subnet/id"))
                .and_then(Value::as_str);
            if let Some(subnet) = subnet {
                subnets.insert(subnet.to_ascii_lowercase());
            }
        }
    }
    subnets
}

impl Heuristic for SameSubnet {
    fn name(&self) -> &'static str {
        "same-subnet"
    }

    fn infer(&self, resources: &[Resource]) -> Vec<Edge> {
        let mut members: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for nic in resources
            .iter()
            .filter(|r| r.kind == ResourceKind::NetworkInterface)
        {
            for subnet in subnets_of(nic) {
                members.entry(subnet).or_default().push(nic.id.as_str());
            }
        }

        let mut edges = Vec::new();
        for (subnet, mut nics) in members {
            nics.sort_unstable();
            nics.dedup();
            for (i, lower) in nics.iter().enumerate() {
                for higher in &nics[i + 1..] {
                    edges.push(
                        Edge::new(*lower, *higher, EdgeKind::SameSubnet, self.name())
                            .with_note(subnet.clone()),
                    );
                }
            }
        }
        edges
    }
}

/// Fallback: a resource whose searched columns mention another resource's
/// identifier references it.
pub struct IdReference {
    pub columns: Vec<String>,
}

impl Default for IdReference {
    fn default() -> Self {
        Self {
            columns: ["properties", "tags", "identity", "managedBy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Heuristic for IdReference {
    fn name(&self) -> &'static str {
        "id-reference"
    }

    fn infer(&self, resources: &[Resource]) -> Vec<Edge> {
        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        // every Azure identifier embeds its group's identifier
        let targets: Vec<(&Resource, String)> = resources
            .iter()
            .filter(|r| !r.is_synthetic() && r.kind != ResourceKind::ResourceGroup)
            .map(|r| (r, r.id.to_ascii_lowercase()))
            .collect();

        resources
            .par_iter()
            .filter(|r| !r.is_synthetic())
            .flat_map_iter(|source| {
                let text = source.properties.search_text(Some(columns.as_slice()));
                targets
                    .iter()
                    .filter(move |(target, needle)| {
                        source.id != target.id && text.mentions(needle)
                    })
                    .map(move |(target, _)| {
                        Edge::new(
                            source.id.as_str(),
                            target.id.as_str(),
                            EdgeKind::References,
                            self.name(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PropertyBag;

    fn resource(id: &str, kind: ResourceKind, rg: &str, props: &[(&str, &str)]) -> Resource {
        Resource {
            id: id.to_string(),
            type_tag: kind.as_str().to_string(),
            kind,
            name: id.to_string(),
            resource_group: rg.to_string(),
            power_state: None,
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<PropertyBag>(),
        }
    }

    fn pairs(edges: &[Edge]) -> Vec<(&str, &str)> {
        edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect()
    }

    #[test]
    fn test_containment() {
        let resources = vec![
            resource("rg1", ResourceKind::ResourceGroup, "", &[]),
            resource("vm1", ResourceKind::VirtualMachine, "RG1", &[]),
            resource("disk1", ResourceKind::Disk, "rg1", &[]),
            resource("orphan", ResourceKind::Disk, "rg2", &[]),
        ];
        let edges = Containment.infer(&resources);
        assert_eq!(pairs(&edges), vec![("rg1", "vm1"), ("rg1", "disk1")]);
        assert!(edges.iter().all(|e| e.kind == EdgeKind::Contains));
        assert_eq!(edges[0].provenance, "containment");
    }

    #[test]
    fn test_group_does_not_contain_itself() {
        let resources = vec![resource("rg1", ResourceKind::ResourceGroup, "rg1", &[])];
        assert!(Containment.infer(&resources).is_empty());
    }

    #[test]
    fn test_network_attachment() {
        let resources = vec![
            resource("vm1", ResourceKind::VirtualMachine, "", &[("nic", "nic1")]),
            resource(
                "nic1",
                ResourceKind::NetworkInterface,
                "",
                &[("nsg", "nsg1"), ("public_ip", "pip1")],
            ),
            resource("nic10", ResourceKind::NetworkInterface, "", &[]),
            resource("nsg1", ResourceKind::NetworkSecurityGroup, "", &[]),
            resource("pip1", ResourceKind::PublicIpAddress, "", &[]),
        ];
        let edges = NetworkAttachment::default().infer(&resources);
        assert_eq!(
            pairs(&edges),
            vec![("vm1", "nic1"), ("nic1", "nsg1"), ("nic1", "pip1")]
        );
    }

    #[test]
    fn test_rule_reference() {
        let resources = vec![
            resource(
                "nsg-open",
                ResourceKind::NetworkSecurityGroup,
                "",
                &[(
                    "securityRules",
                    "name=ssh,direction=Inbound,access=Allow,source=0.0.0.0/0",
                )],
            ),
            resource(
                "nsg-closed",
                ResourceKind::NetworkSecurityGroup,
                "",
                &[(
                    "securityRules",
                    "name=ssh,direction=Inbound,access=Allow,source=10.0.0.0/8",
                )],
            ),
        ];
        let edges = RuleReference::default().infer(&resources);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, INTERNET_NODE_ID);
        assert_eq!(edges[0].target, "nsg-open");
        assert_eq!(edges[0].kind, EdgeKind::ReferencesRule);
        assert_eq!(
            edges[0].note.as_deref(),
            Some("ssh allows inbound from 0.0.0.0/0")
        );
    }

    #[test]
    fn test_same_subnet_pairs() {
        let config = |subnet: &str| {
            format!(
                r#"{{"ipConfigurations":[{{"properties":{{"subnet":{{"id":"{}"}}}}}}]}}"#,
                subnet
            )
        };
        let resources = vec![
            resource(
                "nic-c",
                ResourceKind::NetworkInterface,
                "",
                &[("subnetId", "/V/SUBNETS/SUB1")],
            ),
            resource(
                "nic-a",
                ResourceKind::NetworkInterface,
                "",
                &[("properties", config("/v/subnets/sub1").as_str())],
            ),
            resource(
                "nic-b",
                ResourceKind::NetworkInterface,
                "",
                &[("subnet", "/v/subnets/sub1")],
            ),
            resource(
                "nic-d",
                ResourceKind::NetworkInterface,
                "",
                &[("subnet", "/v/subnets/sub2")],
            ),
        ];
        let edges = SameSubnet.infer(&resources);
        assert_eq!(
            pairs(&edges),
            vec![("nic-a", "nic-b"), ("nic-a", "nic-c"), ("nic-b", "nic-c")]
        );
        assert_eq!(edges[0].note.as_deref(), Some("/v/subnets/sub1"));
    }

    #[test]
    fn test_subnet_display_names_do_not_link_interfaces() {
        let resources = vec![
            resource("nic-a", ResourceKind::NetworkInterface, "", &[("subnet", "default")]),
            resource("nic-b", ResourceKind::NetworkInterface, "", &[("subnet", "default")]),
            resource("nic-c", ResourceKind::NetworkInterface, "", &[("subnet_id", "default")]),
        ];
        let edges = SameSubnet.infer(&resources);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_id_reference_only_searches_listed_columns() {
        let resources = vec![
            resource(
                "/s/disk1",
                ResourceKind::Disk,
                "",
                &[("managedBy", "/s/vm1"), ("note", "/s/kv1")],
            ),
            resource("/s/vm1", ResourceKind::VirtualMachine, "", &[]),
            resource("/s/kv1", ResourceKind::Other, "", &[]),
        ];
        let edges = IdReference::default().infer(&resources);
        assert_eq!(pairs(&edges), vec![("/s/disk1", "/s/vm1")]);
        assert_eq!(edges[0].kind, EdgeKind::References);
    }

    #[test]
    fn test_id_reference_at_scale_keeps_source_order() {
        let mut resources: Vec<Resource> = (0..300)
            .map(|i| {
                let padding = "x".repeat(2048);
                resource(
                    &format!("/S/NIC{}", i),
                    ResourceKind::NetworkInterface,
                    "",
                    &[(
                        "properties",
                        format!("{{\"pad\":\"{}\",\"disk\":\"/s/disk{}\"}}", padding, i).as_str(),
                    )],
                )
            })
            .collect();
        resources.extend((0..300).map(|i| {
            resource(&format!("/s/Disk{}", i), ResourceKind::Disk, "", &[])
        }));

        let edges = IdReference::default().infer(&resources);
        assert_eq!(edges.len(), 300);
        for (i, edge) in edges.iter().enumerate() {
            assert_eq!(edge.source, format!("/S/NIC{}", i));
            assert_eq!(edge.target, format!("/s/Disk{}", i));
        }
    }
}
