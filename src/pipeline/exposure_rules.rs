use serde::{Deserialize, Serialize};

use crate::pipeline::exposure::Evidence;
use crate::pipeline::security_rules::{rules_of, INTERNET_SOURCES};
use crate::resource::{Resource, ResourceKind};

/// Values that mean "no value" in a present-check.
const PLACEHOLDERS: [&str; 4] = ["null", "none", "n/a", "-"];

/// How an [`ExposureRule`] inspects a resource.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "match", rename_all = "kebab-case")]
pub enum RuleMatcher {
    /// One of `paths` holds one of `values` (case-insensitive)
    PropertyEquals {
        paths: Vec<String>,
        values: Vec<String>,
    },
    /// One of `paths` holds any real value
    PropertyPresent { paths: Vec<String> },
    /// An inbound allow security rule has one of `sources` as source
    OpenInboundRule {
        #[serde(default = "default_open_sources")]
        sources: Vec<String>,
    },
}

fn default_open_sources() -> Vec<String> {
    INTERNET_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// A named predicate marking a resource as directly exposed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExposureRule {
    pub name: String,
    /// Kinds the rule applies to; empty means every kind
    #[serde(default)]
    pub kinds: Vec<ResourceKind>,
    pub matcher: RuleMatcher,
}

impl ExposureRule {
    pub fn applies_to(&self, kind: ResourceKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn evaluate(&self, resource: &Resource) -> Option<Evidence> {
        if !self.applies_to(resource.kind) {
            return None;
        }
        let props = &resource.properties;
        match &self.matcher {
            RuleMatcher::PropertyEquals { paths, values } => paths.iter().find_map(|path| {
                let value = props.lookup(path)?;
                values
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(value.trim()))
                    .then(|| Evidence::Property {
                        rule: self.name.clone(),
                        path: path.clone(),
                        value,
                    })
            }),
            RuleMatcher::PropertyPresent { paths } => paths.iter().find_map(|path| {
                let value = props.lookup(path)?;
                let placeholder = PLACEHOLDERS
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(value.trim()));
                (!placeholder).then(|| Evidence::Property {
                    rule: self.name.clone(),
                    path: path.clone(),
                    value,
                })
            }),
            RuleMatcher::OpenInboundRule { sources } => {
                rules_of(resource).into_iter().find_map(|rule| {
                    let source = rule.exposes_to(sources.as_slice())?.to_string();
                    Some(Evidence::SecurityRule {
                        rule: self.name.clone(),
                        security_rule: rule.name,
                        source,
                    })
                })
            }
        }
    }
}

/// Ordered collection of exposure rules. Configuration, not code: a plan
/// file may replace the defaults entirely.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExposureRuleSet {
    pub rules: Vec<ExposureRule>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExposureRuleSet {
    fn default() -> Self {
        Self {
            rules: vec![
                ExposureRule {
                    name: "storage-public-network-access".to_string(),
                    kinds: vec![ResourceKind::StorageAccount],
                    matcher: RuleMatcher::PropertyEquals {
                        paths: strings(&[
                            "public_network_access",
                            "publicNetworkAccess",
                            "properties.publicNetworkAccess",
                        ]),
                        values: strings(&["enabled", "allow"]),
                    },
                },
                ExposureRule {
                    name: "storage-default-action-allow".to_string(),
                    kinds: vec![ResourceKind::StorageAccount],
                    matcher: RuleMatcher::PropertyEquals {
                        paths: strings(&[
                            "default_action",
                            "defaultAction",
                            "properties.networkAcls.defaultAction",
                        ]),
                        values: strings(&["allow"]),
                    },
                },
                ExposureRule {
                    name: "nsg-open-inbound".to_string(),
                    kinds: vec![ResourceKind::NetworkSecurityGroup],
                    matcher: RuleMatcher::OpenInboundRule {
                        sources: default_open_sources(),
                    },
                },
                ExposureRule {
                    name: "public-ip-property".to_string(),
                    kinds: Vec::new(),
                    matcher: RuleMatcher::PropertyPresent {
                        paths: strings(&[
                            "public_ip",
                            "publicIp",
                            "publicIpAddress",
                            "public_ip_address",
                        ]),
                    },
                },
                ExposureRule {
                    name: "public-ip-address".to_string(),
                    kinds: vec![ResourceKind::PublicIpAddress],
                    matcher: RuleMatcher::PropertyPresent {
                        paths: strings(&["properties.ipAddress", "ip_address", "ipAddress"]),
                    },
                },
            ],
        }
    }
}

impl ExposureRuleSet {
    /// Evidence from every rule that matches, in rule order.
    pub fn evaluate(&self, resource: &Resource) -> Vec<Evidence> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(resource))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Sources that count as open in the security-group rules of this set,
    /// first occurrence first. Empty when no rule inspects security rules.
    pub fn open_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for rule in self
            .rules
            .iter()
            .filter(|r| r.applies_to(ResourceKind::NetworkSecurityGroup))
        {
            if let RuleMatcher::OpenInboundRule { sources: open } = &rule.matcher {
                for source in open {
                    if !sources.iter().any(|s| s.eq_ignore_ascii_case(source)) {
                        sources.push(source.clone());
                    }
                }
            }
        }
        sources
    }
}
