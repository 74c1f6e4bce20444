use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

use crate::errors::{RecordError, RecordResult};
use crate::resource::{
    last_segment, PowerState, PropertyBag, Record, Resource, ResourceKind, UNKNOWN_TYPE,
};

static RESOURCE_GROUP_IN_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/resourcegroups/([^/]+)").expect("valid resource group regex"));

const POWER_STATE_PATH: &str = "properties.extended.instanceView.powerState.displayStatus";

/// Names of the columns the normalizer reads. Each is matched
/// case-insensitively, and falls back to a few common spellings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ColumnMapping {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub name: String,
    pub resource_group: String,
    pub power_state: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            type_tag: "type".to_string(),
            name: "name".to_string(),
            resource_group: "resourceGroup".to_string(),
            power_state: "powerState".to_string(),
        }
    }
}

impl Display for ColumnMapping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resource columns: id:{}, type:{}, name:{}, resource_group:{}, power_state:{}",
            self.id, self.type_tag, self.name, self.resource_group, self.power_state,
        )
    }
}

fn field<'r>(record: &'r Record, names: &[&str]) -> Option<&'r str> {
    names.iter().find_map(|name| {
        record
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    })
}

/// Turns one raw record into a [`Resource`].
///
/// Only a missing identifier is fatal for the record; every other column is
/// optional. Nested values (rule lists, JSON blobs) are kept verbatim.
pub fn normalize(record: &Record, row: usize, columns: &ColumnMapping) -> RecordResult<Resource> {
    let id = field(record, &[columns.id.as_str()])
        .ok_or_else(|| RecordError::missing_identifier(row))?
        .to_string();

    let type_tag = field(record, &[columns.type_tag.as_str(), "resource_type", "resourceType"])
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
    let kind = ResourceKind::from_type_tag(&type_tag);

    let name = field(record, &[columns.name.as_str()])
        .or_else(|| last_segment(&id))
        .unwrap_or(&id)
        .to_string();

    let resource_group = field(
        record,
        &[
            columns.resource_group.as_str(),
            "resource_group",
            "resource-group",
        ],
    )
    .map(str::to_string)
    .or_else(|| {
        RESOURCE_GROUP_IN_ID
            .captures(&id)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
    .unwrap_or_default();

    let properties: PropertyBag = record
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let power_state = if kind.is_compute() {
        field(record, &[columns.power_state.as_str(), "power_state"])
            .map(str::to_string)
            .or_else(|| properties.lookup(POWER_STATE_PATH))
            .and_then(|raw| PowerState::parse(&raw))
    } else {
        None
    };

    Ok(Resource {
        id,
        type_tag,
        kind,
        name,
        resource_group,
        power_state,
        properties,
    })
}

/// Result of normalizing a whole export.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    /// Identifier-unique resources, sorted by identifier
    pub resources: Vec<Resource>,
    pub rejected: Vec<RecordError>,
}

/// Normalizes every record in parallel, then enforces identifier
/// uniqueness in input order: the first record with an identifier is kept.
pub fn normalize_all(records: &[Record], columns: &ColumnMapping) -> NormalizeOutcome {
    let results: Vec<RecordResult<Resource>> = records
        .par_iter()
        .enumerate()
        .map(|(row, record)| normalize(record, row, columns))
        .collect();

    let mut outcome = NormalizeOutcome::default();
    let mut first_rows: HashMap<String, usize> = HashMap::new();

    for (row, result) in results.into_iter().enumerate() {
        match result {
            Ok(resource) => {
                if let Some(&first_row) = first_rows.get(&resource.id) {
                    let err = RecordError::DuplicateIdentifier {
                        id: resource.id,
                        row,
                        first_row,
                    };
                    warn!("{}", err);
                    outcome.rejected.push(err);
                    continue;
                }
                first_rows.insert(resource.id.clone(), row);
                outcome.resources.push(resource);
            }
            Err(err) => {
                warn!("Skipping record: {}", err);
                outcome.rejected.push(err);
            }
        }
    }

    outcome.resources.sort_by(|a, b| a.id.cmp(&b.id));
    debug!("{}", columns);
    info!(
        "Normalized {} of {} records ({} rejected)",
        outcome.resources.len(),
        records.len(),
        outcome.rejected.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_identifier_is_malformed() {
        let err = normalize(&record(&[("type", "disk")]), 4, &ColumnMapping::default())
            .unwrap_err();
        assert_eq!(err, RecordError::missing_identifier(4));

        let err = normalize(&record(&[("id", "   ")]), 0, &ColumnMapping::default()).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RECORD");
    }

    #[test]
    fn test_missing_type_becomes_unknown() {
        let resource = normalize(&record(&[("id", "thing")]), 0, &ColumnMapping::default())
            .unwrap();
        assert_eq!(resource.type_tag, UNKNOWN_TYPE);
        assert_eq!(resource.kind, ResourceKind::Other);
        assert_eq!(resource.name, "thing");
        assert_eq!(resource.resource_group, "");
        assert!(resource.power_state.is_none());
    }

    #[test]
    fn test_azure_row() {
        let id = "/subscriptions/s1/resourceGroups/Prod/providers/Microsoft.Compute/virtualMachines/web01";
        let resource = normalize(
            &record(&[
                ("id", id),
                ("name", "web01"),
                ("type", "Microsoft.Compute/virtualMachines"),
                ("location", "westeurope"),
                (
                    "properties",
                    r#"{"extended":{"instanceView":{"powerState":{"displayStatus":"VM running"}}}}"#,
                ),
            ]),
            0,
            &ColumnMapping::default(),
        )
        .unwrap();
        assert_eq!(resource.kind, ResourceKind::VirtualMachine);
        assert_eq!(resource.type_tag, "microsoft.compute/virtualmachines");
        assert_eq!(resource.resource_group, "Prod");
        assert_eq!(resource.power_state, Some(PowerState::Running));
        assert_eq!(resource.properties.get("location"), Some("westeurope"));
    }

    #[test]
    fn test_power_state_ignored_for_non_compute() {
        let resource = normalize(
            &record(&[("id", "disk1"), ("type", "disk"), ("powerState", "running")]),
            0,
            &ColumnMapping::default(),
        )
        .unwrap();
        assert!(resource.power_state.is_none());
        assert_eq!(resource.properties.get("powerState"), Some("running"));
    }

    #[test]
    fn test_nested_values_kept_verbatim() {
        let rules = "name=ssh,direction=Inbound,access=Allow,source=Internet;name=deny,direction=Inbound,access=Deny,source=*";
        let resource = normalize(
            &record(&[("id", "nsg1"), ("type", "security-group"), ("securityRules", rules)]),
            0,
            &ColumnMapping::default(),
        )
        .unwrap();
        assert_eq!(resource.properties.get("securityRules"), Some(rules));
    }

    #[test]
    fn test_custom_columns() {
        let columns = ColumnMapping {
            id: "ResourceId".to_string(),
            type_tag: "Kind".to_string(),
            ..ColumnMapping::default()
        };
        let resource = normalize(
            &record(&[("resourceid", "nic9"), ("kind", "network-interface")]),
            0,
            &columns,
        )
        .unwrap();
        assert_eq!(resource.id, "nic9");
        assert_eq!(resource.kind, ResourceKind::NetworkInterface);
    }

    #[test]
    fn test_normalize_all_enforces_unique_ids() {
        let records = vec![
            record(&[("id", "b"), ("type", "disk")]),
            record(&[("type", "disk")]),
            record(&[("id", "a"), ("type", "disk")]),
            record(&[("id", "b"), ("type", "virtual-machine")]),
        ];
        let outcome = normalize_all(&records, &ColumnMapping::default());
        let ids: Vec<&str> = outcome.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(outcome.resources[1].kind, ResourceKind::Disk);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(
            outcome.rejected[1],
            RecordError::DuplicateIdentifier {
                id: "b".to_string(),
                row: 3,
                first_row: 0
            }
        );
    }
}
