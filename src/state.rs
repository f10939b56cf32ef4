use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{Address, ResourceData, StateUpdate, StepOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Format version written by this build
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// Recorded state of every managed instance on one instance connection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    /// Format version
    pub version: u32,

    /// Incremented on every write
    pub serial: u64,

    /// Instance the recorded resources live on
    pub connection_name: String,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,

    /// Recorded resources keyed by address
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

/// Recorded state of one instance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResourceState {
    /// Resource type name
    #[serde(rename = "type")]
    pub type_name: String,

    /// Attribute values after the last successful operation
    pub attributes: ResourceData,
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Empty state for a connection
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            connection_name: connection_name.into(),
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    /// Read a state file without checking which connection it belongs to
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        if state.version != STATE_VERSION {
            bail!(
                "State file {} has format version {}, this build reads version {STATE_VERSION}",
                path.display(),
                state.version
            );
        }
        Ok(state)
    }

    /// Load the state for `connection_name`, or start empty if the file doesn't exist
    ///
    /// A state file recorded for another connection is refused.
    pub fn load(path: &Path, connection_name: &str) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::new(connection_name));
        }

        let state = Self::read(path)?;
        if state.connection_name != connection_name {
            bail!(
                "State file {} belongs to connection '{}', not '{connection_name}'",
                path.display(),
                state.connection_name
            );
        }

        log::debug!(
            "Loaded state serial {} ({} resources) from {}",
            state.serial,
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk
    ///
    /// Bumps the serial and writes through a temporary file renamed into
    /// place, so a crash never leaves a truncated state file.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.serial += 1;
        self.last_updated = Utc::now();
        let content = serde_json::to_string_pretty(&self).context("Failed to serialize state")?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);
        fs::write(tmp, content + "\n")
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state serial {} to {}", self.serial, path.display());
        Ok(())
    }

    // ========================================================================
    // Resource Helpers
    // ========================================================================

    /// Recorded instances keyed by address
    pub fn instances(&self) -> Result<BTreeMap<Address, ResourceData>> {
        let mut instances = BTreeMap::new();
        for (key, resource) in &self.resources {
            let address = Address::parse(key)
                .with_context(|| format!("State holds malformed address '{key}'"))?;
            if address.type_name != resource.type_name {
                bail!(
                    "State entry '{key}' is recorded with type '{}'",
                    resource.type_name
                );
            }
            instances.insert(address, resource.attributes.clone());
        }
        Ok(instances)
    }

    /// Replace every recorded instance
    pub fn replace_instances(&mut self, instances: BTreeMap<Address, ResourceData>) {
        self.resources.clear();
        for (address, attributes) in instances {
            self.set(&address, attributes);
        }
    }

    pub fn get(&self, address: &Address) -> Option<&ResourceState> {
        self.resources.get(&address.to_string())
    }

    pub fn set(&mut self, address: &Address, attributes: ResourceData) {
        self.resources.insert(
            address.to_string(),
            ResourceState {
                type_name: address.type_name.clone(),
                attributes,
            },
        );
    }

    pub fn remove(&mut self, address: &Address) -> bool {
        self.resources.remove(&address.to_string()).is_some()
    }

    /// Record what an execution did; returns whether anything changed
    pub fn apply_outcomes(&mut self, outcomes: &[StepOutcome]) -> bool {
        let mut changed = false;
        for outcome in outcomes {
            match &outcome.state {
                StateUpdate::Unchanged => {}
                StateUpdate::Set(attributes) => {
                    self.set(&outcome.address, attributes.clone());
                    changed = true;
                }
                StateUpdate::Remove => changed |= self.remove(&outcome.address),
            }
        }
        changed
    }
}

// ============================================================================
// Tests
// ============================================================================
