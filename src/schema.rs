//! Manifest schema
//!
//! A manifest is a TOML file with one optional `[provider]` table and one
//! table per resource type, keyed by instance name:
//!
//! ```toml
//! [provider]
//! connection_name = "my-project:europe-west1:main"
//! username = "admin"
//!
//! [role.readers]
//! name = "readers"
//!
//! [grant.app_readers]
//! database = "app"
//! role = "readers"
//! privileges = ["SELECT", "SHOW VIEW"]
//! ```

use crate::config::ProviderSettings;
use anyhow::{Context, Result, bail};
use declarative::{Address, ResourceData};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A parsed manifest
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// Connection settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Resource tables: type -> name -> attributes
    #[serde(flatten)]
    resources: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl Manifest {
    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Invalid TOML format in manifest")?;
        log::debug!(
            "Manifest declares {} resource(s) across {} type(s)",
            manifest.len(),
            manifest.resources.len()
        );
        Ok(manifest)
    }

    /// Number of declared instances
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared resource type names
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Desired state of every declared instance, keyed by address
    ///
    /// Unknown types are left for the planner to report, alongside schema
    /// problems.
    pub fn desired(&self) -> Result<BTreeMap<Address, ResourceData>> {
        let mut desired = BTreeMap::new();
        let mut problems = Vec::new();

        for (type_name, instances) in &self.resources {
            for (name, value) in instances {
                let address = Address::new(type_name.as_str(), name.as_str());
                match to_data(value) {
                    Ok(data) => {
                        desired.insert(address, data);
                    }
                    Err(e) => problems.push(format!("{address}: {e}")),
                }
            }
        }

        if !problems.is_empty() {
            bail!(
                "manifest has {} problem(s):\n  {}",
                problems.len(),
                problems.join("\n  ")
            );
        }
        Ok(desired)
    }
}

fn to_data(value: &toml::Value) -> Result<ResourceData> {
    if !value.is_table() {
        bail!("expected a table of attributes, found {}", value.type_str());
    }
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(ResourceData::from_map(map)),
        other => bail!("expected a table of attributes, found {other}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"
[provider]
connection_name = "my-project:europe-west1:main"
username = "admin"

[database.app]
name = "app"
character_set = "utf8mb4"

[role.readers]
name = "readers"

[grant.app_readers]
database = "app"
role = "readers"
privileges = ["SELECT", "SHOW VIEW"]

[audit_rule.selects]
user = "*"
database = "app"
object = "*"
operation = "select"
ops_result = "B"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.len(), 4);
        assert_eq!(
            manifest.provider.connection_name.as_deref(),
            Some("my-project:europe-west1:main")
        );
        assert_eq!(
            manifest.type_names().collect::<Vec<_>>(),
            vec!["audit_rule", "database", "grant", "role"]
        );
    }

    #[test]
    fn test_desired_keys_by_address() {
        let desired = Manifest::parse(MANIFEST).unwrap().desired().unwrap();
        let grant = &desired[&Address::new("grant", "app_readers")];
        assert_eq!(grant.get("privileges"), Some(&json!(["SELECT", "SHOW VIEW"])));
        assert_eq!(grant.get_str("role"), Some("readers"));
        assert!(desired.contains_key(&Address::new("audit_rule", "selects")));
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::parse("").unwrap();
        assert!(manifest.is_empty());
        assert!(manifest.desired().unwrap().is_empty());
    }

    #[test]
    fn test_non_table_instance_is_rejected() {
        let manifest = Manifest::parse("[role]\nreaders = \"readers\"\n").unwrap();
        let err = manifest.desired().unwrap_err().to_string();
        assert!(err.contains("role.readers: expected a table"), "{err}");
    }

    #[test]
    fn test_unknown_provider_key_is_rejected() {
        assert!(Manifest::parse("[provider]\nproxy = \"socks5://x:1\"\n").is_err());
    }
}
