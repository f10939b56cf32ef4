//! Attribute schema for resource types
//!
//! A schema tells the planner which attributes to compare, how to compare
//! them, and whether a change can be applied in place.

use crate::types::ResourceData;
use serde::Serialize;
use serde_json::Value;

/// Shape of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// A single value
    Scalar,
    /// An unordered collection; element order never counts as a change
    Set,
}

/// One declared attribute
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    /// Changing the value destroys and recreates the resource
    pub requires_replace: bool,
    /// Value is (also) produced by the server
    pub computed: bool,
    /// May be omitted from configuration
    pub optional: bool,
    /// String elements compare case-insensitively
    pub case_insensitive: bool,
    /// Value assumed when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Attribute {
    /// A required scalar attribute
    pub fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::Scalar,
            requires_replace: false,
            computed: false,
            optional: false,
            case_insensitive: false,
            default: None,
        }
    }

    /// A required set attribute
    pub fn set(name: &'static str) -> Self {
        Self {
            kind: AttributeKind::Set,
            ..Self::scalar(name)
        }
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Optional with a default value
    pub fn default_value(mut self, value: Value) -> Self {
        self.optional = true;
        self.default = Some(value);
        self
    }

    /// Whether two values are the same under this attribute's rules
    fn same(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        let a = a.unwrap_or(&Value::Null);
        let b = b.unwrap_or(&Value::Null);
        match (self.kind, a, b) {
            (AttributeKind::Set, Value::Array(a), Value::Array(b)) => {
                let mut a: Vec<String> = a.iter().map(|v| self.normalize(v)).collect();
                let mut b: Vec<String> = b.iter().map(|v| self.normalize(v)).collect();
                a.sort();
                a.dedup();
                b.sort();
                b.dedup();
                a == b
            }
            (AttributeKind::Scalar, Value::String(a), Value::String(b)) if self.case_insensitive => {
                a.eq_ignore_ascii_case(b)
            }
            _ => a == b,
        }
    }

    fn normalize(&self, value: &Value) -> String {
        match value {
            Value::String(s) if self.case_insensitive => s.to_ascii_uppercase(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A detected difference in one attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub name: String,
    pub from: Value,
    pub to: Value,
    pub requires_replace: bool,
}

/// The attributes of a resource type
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Fill omitted attributes that have defaults
    pub fn apply_defaults(&self, data: &mut ResourceData) {
        for attr in &self.attributes {
            if let Some(default) = &attr.default
                && data.get(attr.name).is_none_or(Value::is_null)
            {
                data.set(attr.name, default.clone());
            }
        }
    }

    /// Names that are neither declared nor computed-only, and required names that are missing
    pub fn check(&self, data: &ResourceData) -> Vec<String> {
        let mut problems = Vec::new();
        for key in data.as_map().keys() {
            match self.attribute(key) {
                None => problems.push(format!("unknown attribute '{key}'")),
                Some(attr) if attr.computed && !attr.optional => {
                    problems.push(format!("attribute '{key}' is computed and cannot be set"));
                }
                Some(_) => {}
            }
        }
        for attr in &self.attributes {
            let missing = data.get(attr.name).is_none_or(Value::is_null);
            if missing && !attr.optional && !attr.computed {
                problems.push(format!("missing required attribute '{}'", attr.name));
            }
        }
        problems
    }

    /// Differences between the prior state and the desired configuration
    ///
    /// Computed attributes are skipped unless the configuration sets them.
    pub fn changes(&self, prior: &ResourceData, desired: &ResourceData) -> Vec<AttributeChange> {
        self.attributes
            .iter()
            .filter(|attr| {
                let unset = desired.get(attr.name).is_none_or(Value::is_null);
                !(attr.computed && (!attr.optional || unset))
            })
            .filter(|attr| !attr.same(prior.get(attr.name), desired.get(attr.name)))
            .map(|attr| AttributeChange {
                name: attr.name.to_string(),
                from: prior.get(attr.name).cloned().unwrap_or(Value::Null),
                to: desired.get(attr.name).cloned().unwrap_or(Value::Null),
                requires_replace: attr.requires_replace,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::scalar("id").computed(),
            Attribute::scalar("database").requires_replace(),
            Attribute::set("privileges").requires_replace().case_insensitive(),
            Attribute::scalar("with_grant_option")
                .requires_replace()
                .default_value(json!(false)),
            Attribute::scalar("character_set").optional().computed().requires_replace(),
            Attribute::scalar("operation"),
        ])
    }

    fn data(value: Value) -> ResourceData {
        match value {
            Value::Object(map) => ResourceData::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_set_order_and_case_do_not_count() {
        let prior = data(json!({"privileges": ["SELECT", "insert"]}));
        let desired = data(json!({"privileges": ["Insert", "select"]}));
        let changes = schema().changes(&prior, &desired);
        assert!(changes.iter().all(|c| c.name != "privileges"));
    }

    #[test]
    fn test_computed_attributes_are_skipped() {
        let prior = data(json!({"id": 7, "character_set": "utf8mb4", "operation": "read"}));
        let desired = data(json!({"operation": "read"}));
        assert!(schema().changes(&prior, &desired).is_empty());
    }

    #[test]
    fn test_optional_computed_compared_when_set() {
        let prior = data(json!({"character_set": "utf8mb4"}));
        let desired = data(json!({"character_set": "latin1"}));
        let changes = schema().changes(&prior, &desired);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].requires_replace);
    }

    #[test]
    fn test_in_place_change() {
        let prior = data(json!({"operation": "read"}));
        let desired = data(json!({"operation": "write"}));
        let changes = schema().changes(&prior, &desired);
        assert_eq!(changes[0].name, "operation");
        assert!(!changes[0].requires_replace);
        assert_eq!(changes[0].from, json!("read"));
    }

    #[test]
    fn test_defaults_fill_missing_values() {
        let mut desired = data(json!({"database": "app"}));
        schema().apply_defaults(&mut desired);
        assert_eq!(desired.get("with_grant_option"), Some(&json!(false)));
    }

    #[test]
    fn test_check_reports_unknown_and_missing() {
        let problems = schema().check(&data(json!({"colour": "red", "id": 3})));
        assert!(problems.iter().any(|p| p.contains("unknown attribute 'colour'")));
        assert!(problems.iter().any(|p| p.contains("'id' is computed")));
        assert!(problems.iter().any(|p| p.contains("missing required attribute 'database'")));
    }
}
