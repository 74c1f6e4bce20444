use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// One raw row of the export: column name -> cell text, in column order.
pub type Record = IndexMap<String, String>;

/// Type tag used when a record carries no type column.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Identifier of the synthetic node standing for the public internet.
pub const INTERNET_NODE_ID: &str = "internet";

/// Coarse classification of a resource type tag.
///
/// The raw tag is kept on the [`Resource`]; the kind only drives which
/// heuristics and exposure rules apply.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    VirtualMachine,
    VmExtension,
    NetworkInterface,
    NetworkSecurityGroup,
    PublicIpAddress,
    StorageAccount,
    Disk,
    VirtualNetwork,
    Subnet,
    RouteTable,
    ResourceGroup,
    Internet,
    Other,
}

impl ResourceKind {
    /// Maps both full provider tags (`microsoft.compute/virtualmachines`) and
    /// short tags (`virtual-machine`) onto a kind.
    ///
    /// Only the last type segment counts, so child types such as
    /// `networksecuritygroups/securityrules` do not take their parent's kind.
    /// [`ResourceKind::Internet`] is reserved for [`Resource::internet`] and
    /// never comes out of a type tag.
    pub fn from_type_tag(tag: &str) -> Self {
        let lowered = tag.trim().to_ascii_lowercase();
        let last = last_segment(&lowered).unwrap_or_default();
        let compact: String = last
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();

        match compact.as_str() {
            "extensions" | "vmextension" => ResourceKind::VmExtension,
            "subnets" | "subnet" => ResourceKind::Subnet,
            "virtualmachines" | "virtualmachine" | "vm" => ResourceKind::VirtualMachine,
            "networkinterfaces" | "networkinterface" | "nic" => ResourceKind::NetworkInterface,
            "networksecuritygroups" | "networksecuritygroup" | "securitygroup" | "nsg" => {
                ResourceKind::NetworkSecurityGroup
            }
            "publicipaddresses" | "publicipaddress" | "publicip" => {
                ResourceKind::PublicIpAddress
            }
            "storageaccounts" | "storageaccount" => ResourceKind::StorageAccount,
            "disks" | "disk" => ResourceKind::Disk,
            "virtualnetworks" | "virtualnetwork" | "vnet" => ResourceKind::VirtualNetwork,
            "routetables" | "routetable" => ResourceKind::RouteTable,
            "resourcegroups" | "resourcegroup" => ResourceKind::ResourceGroup,
            _ => ResourceKind::Other,
        }
    }

    /// Compute resources are the only ones that carry a power state.
    pub fn is_compute(&self) -> bool {
        matches!(self, ResourceKind::VirtualMachine)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "virtual-machine",
            ResourceKind::VmExtension => "vm-extension",
            ResourceKind::NetworkInterface => "network-interface",
            ResourceKind::NetworkSecurityGroup => "network-security-group",
            ResourceKind::PublicIpAddress => "public-ip-address",
            ResourceKind::StorageAccount => "storage-account",
            ResourceKind::Disk => "disk",
            ResourceKind::VirtualNetwork => "virtual-network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::RouteTable => "route-table",
            ResourceKind::ResourceGroup => "resource-group",
            ResourceKind::Internet => "internet",
            ResourceKind::Other => "other",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PowerState {
    Running,
    Starting,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown(String),
}

impl PowerState {
    /// Accepts `VM running`, `PowerState/running`, `Running` and friends.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lowered = trimmed.to_ascii_lowercase();
        let state = lowered.rsplit('/').next().unwrap_or(lowered.as_str());
        let state = state.strip_prefix("vm ").unwrap_or(state).trim();
        Some(match state {
            "running" => PowerState::Running,
            "starting" => PowerState::Starting,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" => PowerState::Deallocated,
            _ => PowerState::Unknown(trimmed.to_string()),
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PowerState::Running)
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Running => write!(f, "running"),
            PowerState::Starting => write!(f, "starting"),
            PowerState::Stopping => write!(f, "stopping"),
            PowerState::Stopped => write!(f, "stopped"),
            PowerState::Deallocating => write!(f, "deallocating"),
            PowerState::Deallocated => write!(f, "deallocated"),
            PowerState::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Schema-less property mapping of a resource.
///
/// Lookups never fail: a missing key, an empty cell, a value that is not
/// JSON, or a JSON path that does not resolve all read as "absent".
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PropertyBag(IndexMap<String, String>);

impl PropertyBag {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Case-insensitive column lookup; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match self.0.get(key) {
            Some(value) => Some(value),
            None => self
                .0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
        };
        value.map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// First present key out of a list of aliases.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Parses one column as JSON.
    pub fn json(&self, key: &str) -> Option<Value> {
        self.get(key)
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
    }

    /// Resolves a dotted path such as `properties.networkAcls.defaultAction`.
    ///
    /// A column literally named like the whole path wins; otherwise the first
    /// segment names a column holding JSON and the rest walks into it.
    /// Numeric segments index into arrays.
    pub fn lookup(&self, path: &str) -> Option<String> {
        if let Some(value) = self.get(path) {
            return Some(value.to_string());
        }
        let (column, rest) = path.split_once('.')?;
        let document = self.json(column)?;
        json_path(&document, rest).and_then(scalar_to_string)
    }

    /// Same as [`lookup`](Self::lookup) but hands back the JSON node itself.
    pub fn lookup_value(&self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            Some((column, rest)) => {
                let document = self.json(column)?;
                json_path(&document, rest).cloned()
            }
            None => self.json(path),
        }
    }

    /// Whether any value mentions `needle`, ignoring case.
    pub fn contains_reference(&self, needle: &str) -> bool {
        self.contains_reference_in(needle, None)
    }

    /// Like [`contains_reference`](Self::contains_reference), restricted to
    /// the given columns when `columns` is set.
    pub fn contains_reference_in(&self, needle: &str, columns: Option<&[&str]>) -> bool {
        self.search_text(columns)
            .mentions(&needle.to_ascii_lowercase())
    }

    /// Lower-cased copy of the values (of `columns` when set) for repeated
    /// reference searches.
    pub fn search_text(&self, columns: Option<&[&str]>) -> SearchText {
        SearchText(
            self.0
                .iter()
                .filter(|(key, _)| match columns {
                    Some(columns) => columns.iter().any(|c| c.eq_ignore_ascii_case(key)),
                    None => true,
                })
                .map(|(_, value)| value.to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lower-cased property values, built once per resource and searched once
/// per candidate identifier.
#[derive(Clone, Debug, Default)]
pub struct SearchText(Vec<String>);

impl SearchText {
    /// Whether any value mentions `needle`, which must already be lower-cased.
    pub fn mentions(&self, needle: &str) -> bool {
        !needle.is_empty() && self.0.iter().any(|value| mentions(value, needle))
    }
}

impl FromIterator<(String, String)> for PropertyBag {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// `nic1` must not match inside `nic10`, but `/vm1` may match inside `/vm1/extensions/x`.
fn mentions(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | '.');
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

fn json_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |node, segment| match node {
        Value::Object(map) => map.get(segment).or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(segment))
                .map(|(_, v)| v)
        }),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One cloud entity, built from one input record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Resource {
    pub id: String,
    pub type_tag: String,
    pub kind: ResourceKind,
    pub name: String,
    pub resource_group: String,
    pub power_state: Option<PowerState>,
    pub properties: PropertyBag,
}

impl Resource {
    /// The synthetic endpoint for edges describing traffic from the internet.
    pub fn internet() -> Self {
        Self {
            id: INTERNET_NODE_ID.to_string(),
            type_tag: INTERNET_NODE_ID.to_string(),
            kind: ResourceKind::Internet,
            name: "Internet".to_string(),
            resource_group: String::new(),
            power_state: None,
            properties: PropertyBag::new(),
        }
    }

    /// Lower-cased group name a resource group stands for, derived from its
    /// identifier (`/subscriptions/s/resourceGroups/rg1` and `rg1` both give
    /// `rg1`).
    pub fn group_key(&self) -> Option<String> {
        if self.kind != ResourceKind::ResourceGroup {
            return None;
        }
        last_segment(&self.id).map(|s| s.to_ascii_lowercase())
    }

    pub fn is_synthetic(&self) -> bool {
        self.kind == ResourceKind::Internet
    }
}

/// Last non-empty `/`-separated segment of an identifier.
pub fn last_segment(id: &str) -> Option<&str> {
    id.trim().rsplit('/').find(|s| !s.is_empty())
}
