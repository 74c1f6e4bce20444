use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::Resource;

/// Source prefixes that stand for "anywhere on the internet".
pub const INTERNET_SOURCES: [&str; 3] = ["*", "internet", "0.0.0.0/0"];

/// Columns that may carry a security rule list as text.
const RULE_COLUMNS: [&str; 3] = ["securityRules", "security_rules", "rules"];

/// One entry of a network security group's rule list.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityRule {
    pub name: String,
    pub direction: String,
    pub access: String,
    pub sources: Vec<String>,
    pub priority: Option<i64>,
}

impl SecurityRule {
    pub fn is_inbound_allow(&self) -> bool {
        self.direction.eq_ignore_ascii_case("inbound") && self.access.eq_ignore_ascii_case("allow")
    }

    /// First of this rule's sources that appears in `open_sources`.
    pub fn open_source<S: AsRef<str>>(&self, open_sources: &[S]) -> Option<&str> {
        self.sources
            .iter()
            .map(|s| s.trim())
            .find(|s| open_sources.iter().any(|o| o.as_ref().eq_ignore_ascii_case(s)))
    }

    /// Inbound allow rule whose source is one of `open_sources`.
    pub fn exposes_to<S: AsRef<str>>(&self, open_sources: &[S]) -> Option<&str> {
        if self.is_inbound_allow() {
            self.open_source(open_sources)
        } else {
            None
        }
    }
}

/// Collects the security rules a resource carries, wherever they are.
///
/// Rule text columns are read first, then `properties.securityRules` of the
/// Azure JSON shape. Anything that does not parse contributes nothing.
pub fn rules_of(resource: &Resource) -> Vec<SecurityRule> {
    let mut rules: Vec<SecurityRule> = RULE_COLUMNS
        .iter()
        .filter_map(|column| resource.properties.get(column))
        .flat_map(parse_rule_text)
        .collect();

    if let Some(value) = resource.properties.lookup_value("properties.securityRules") {
        rules.extend(from_json(&value));
    }
    rules
}

/// Parses either a JSON rule list or the delimited
/// `name=..,direction=..,access=..,source=..;...` form.
pub fn parse_rule_text(text: &str) -> Vec<SecurityRule> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed)
            .map(|value| from_json(&value))
            .unwrap_or_default();
    }
    trimmed
        .split(';')
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(parse_delimited_rule)
        .collect()
}

fn parse_delimited_rule(chunk: &str) -> Option<SecurityRule> {
    let mut rule = SecurityRule::default();
    let mut recognized = false;

    for pair in chunk.split(',') {
        let Some((key, value)) = pair.split_once('=').or_else(|| pair.split_once(':')) else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => rule.name = value.to_string(),
            "direction" => rule.direction = value.to_string(),
            "access" => rule.access = value.to_string(),
            "source" | "src" | "sourceaddressprefix" => rule
                .sources
                .extend(value.split_whitespace().map(str::to_string)),
            "priority" => rule.priority = value.parse().ok(),
            _ => continue,
        }
        recognized = true;
    }
    recognized.then_some(rule)
}

fn from_json(value: &Value) -> Vec<SecurityRule> {
    match value {
        Value::Array(items) => items.iter().filter_map(rule_from_object).collect(),
        Value::Object(map) => match field(map, "securityRules") {
            Some(inner) => from_json(inner),
            None => rule_from_object(value).into_iter().collect(),
        },
        _ => Vec::new(),
    }
}

fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    field(map, key).and_then(Value::as_str).map(str::to_string)
}

fn rule_from_object(value: &Value) -> Option<SecurityRule> {
    let outer = value.as_object()?;
    // Azure nests the rule body under "properties"
    let body = field(outer, "properties")
        .and_then(Value::as_object)
        .unwrap_or(outer);

    let mut sources: Vec<String> = ["sourceAddressPrefix", "source"]
        .iter()
        .filter_map(|key| text(body, key))
        .collect();
    if let Some(Value::Array(prefixes)) = field(body, "sourceAddressPrefixes") {
        sources.extend(prefixes.iter().filter_map(Value::as_str).map(str::to_string));
    }

    let direction = text(body, "direction");
    let access = text(body, "access");
    if direction.is_none() && access.is_none() && sources.is_empty() {
        return None;
    }

    Some(SecurityRule {
        name: text(outer, "name")
            .or_else(|| text(body, "name"))
            .unwrap_or_default(),
        direction: direction.unwrap_or_default(),
        access: access.unwrap_or_default(),
        sources,
        priority: field(body, "priority").and_then(Value::as_i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{PropertyBag, ResourceKind};

    fn nsg(column: &str, value: &str) -> Resource {
        let mut properties = PropertyBag::new();
        properties.insert(column, value);
        Resource {
            id: "nsg1".to_string(),
            type_tag: "security-group".to_string(),
            kind: ResourceKind::NetworkSecurityGroup,
            name: "nsg1".to_string(),
            resource_group: String::new(),
            power_state: None,
            properties,
        }
    }

    #[test]
    fn test_parse_delimited() {
        let rules = parse_rule_text(
            "name=ssh,direction=Inbound,access=Allow,source=Internet,priority=100; name=deny,direction=Inbound,access=Deny,source=*",
        );
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "ssh");
        assert_eq!(rules[0].priority, Some(100));
        assert!(rules[0].is_inbound_allow());
        assert!(!rules[1].is_inbound_allow());
        assert_eq!(rules[0].exposes_to(&INTERNET_SOURCES), Some("Internet"));
        assert_eq!(rules[1].exposes_to(&INTERNET_SOURCES), None);
    }

    #[test]
    fn test_parse_flat_json() {
        let rules = parse_rule_text(
            r#"[{"name":"rdp","direction":"Inbound","access":"Allow","sourceAddressPrefix":"0.0.0.0/0"}]"#,
        );
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].sources, vec!["0.0.0.0/0"]);
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        assert!(parse_rule_text("[not json").is_empty());
        assert!(parse_rule_text("just some words").is_empty());
        assert!(parse_rule_text("").is_empty());
    }

    #[test]
    fn test_rules_from_azure_properties() {
        let resource = nsg(
            "properties",
            r#"{"securityRules":[{"name":"web","properties":{"direction":"Inbound","access":"Allow","priority":200,"sourceAddressPrefixes":["10.0.0.0/8","*"]}}]}"#,
        );
        let rules = rules_of(&resource);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "web");
        assert_eq!(rules[0].priority, Some(200));
        assert_eq!(rules[0].exposes_to(&INTERNET_SOURCES), Some("*"));
    }

    #[test]
    fn test_private_source_is_not_open() {
        let resource = nsg(
            "securityRules",
            "name=internal,direction=Inbound,access=Allow,source=10.0.0.0/8",
        );
        let rules = rules_of(&resource);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].exposes_to(&INTERNET_SOURCES), None);
    }
}
