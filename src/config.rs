//! Provider connection settings and file locations
//!
//! Settings come from the `[provider]` table of the manifest, with
//! `CLOUDSQL_MYSQL_*` environment variables filling whatever the manifest
//! leaves out.
//!
//! Connections are plain MySQL connections to `host:port`, normally a Cloud
//! SQL Auth Proxy already bound to the instance. `connection_name` does not
//! select the instance: it is format-checked and recorded in the state file,
//! which refuses to be used against any other connection name.

use anyhow::{Context, Result, bail};
use mysqlkit::backend::mysql::MySqlOpener;
use mysqlkit::{ConnectionRegistry, DsnTemplate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

pub const ENV_CONNECTION_NAME: &str = "CLOUDSQL_MYSQL_CONNECTION_NAME";
pub const ENV_USERNAME: &str = "CLOUDSQL_MYSQL_USERNAME";
pub const ENV_PASSWORD: &str = "CLOUDSQL_MYSQL_PASSWORD";
pub const ENV_HOST: &str = "CLOUDSQL_MYSQL_HOST";
pub const ENV_PORT: &str = "CLOUDSQL_MYSQL_PORT";

/// Cloud SQL Auth Proxy listening locally
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Manifest looked up in the working directory when `-f` is not given
pub const MANIFEST_FILE: &str = "cloudsqlmysql.toml";
/// State file written beside the manifest
pub const STATE_FILE: &str = "cloudsqlmysql.state.json";

static CONNECTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9\-]+:[a-z0-9\-]+:[a-z0-9\-]+$").expect("connection name pattern is valid")
});

// ============================================================================
// Paths
// ============================================================================

/// Get the user config directory (~/.config/cloudsqlmysql)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("cloudsqlmysql"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Could not expand path '{path}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Resolve the manifest path
///
/// An explicit path wins; otherwise `./cloudsqlmysql.toml`, then the user
/// config directory.
pub fn manifest_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return expand_path(path);
    }
    let local = PathBuf::from(MANIFEST_FILE);
    if local.exists() {
        return Ok(local);
    }
    let user = config_dir()?.join(MANIFEST_FILE);
    if user.exists() {
        return Ok(user);
    }
    bail!(
        "No manifest found: looked for ./{MANIFEST_FILE} and {} (use -f to point at one)",
        user.display()
    )
}

/// Resolve the state file path: explicit, or beside the manifest
pub fn state_path(explicit: Option<&str>, manifest: &Path) -> Result<PathBuf> {
    match explicit {
        Some(path) => expand_path(path),
        None => Ok(manifest
            .parent()
            .map_or_else(|| PathBuf::from(STATE_FILE), |dir| dir.join(STATE_FILE))),
    }
}

// ============================================================================
// Provider settings
// ============================================================================

/// The `[provider]` table as written in the manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// `<project>:<region>:<instance>`; identifies the state, not the endpoint
    #[serde(default)]
    pub connection_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Address of the auth proxy (or any MySQL endpoint) to connect to
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Pool size of each connection handle
    #[serde(default)]
    pub max_connections: Option<u32>,
}

/// Fully resolved, validated provider configuration
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub connection_name: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

impl ProviderSettings {
    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<ProviderConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable lookup
    ///
    /// Manifest values win over the environment. Every problem is reported,
    /// not just the first.
    pub fn resolve_with<F>(&self, env: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |value: &Option<String>, key: &str| value.clone().or_else(|| env(key));
        let mut problems = Vec::new();

        let connection_name = pick(&self.connection_name, ENV_CONNECTION_NAME).unwrap_or_default();
        if connection_name.is_empty() {
            problems.push(format!("connection_name is required (or set {ENV_CONNECTION_NAME})"));
        } else if !CONNECTION_NAME.is_match(&connection_name) {
            problems.push(format!(
                "connection_name '{connection_name}' must have the format <project>:<region>:<instance>"
            ));
        }

        let username = pick(&self.username, ENV_USERNAME).unwrap_or_default();
        if username.is_empty() {
            problems.push(format!("username is required (or set {ENV_USERNAME})"));
        }

        let password = pick(&self.password, ENV_PASSWORD).unwrap_or_default();
        if password.is_empty() {
            problems.push(format!("password is required (or set {ENV_PASSWORD})"));
        }

        let host = pick(&self.host, ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.is_empty() {
            problems.push("host must not be empty".to_string());
        }

        let port = match self.port {
            Some(port) => port,
            None => match env(ENV_PORT) {
                None => DEFAULT_PORT,
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    problems.push(format!("{ENV_PORT}='{raw}' is not a valid port"));
                    DEFAULT_PORT
                }),
            },
        };
        if port == 0 {
            problems.push("port must not be 0".to_string());
        }

        let max_connections = self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            problems.push("max_connections must be at least 1".to_string());
        }

        if !problems.is_empty() {
            bail!(
                "provider configuration has {} problem(s):\n  {}",
                problems.len(),
                problems.join("\n  ")
            );
        }

        Ok(ProviderConfig {
            connection_name,
            username,
            password,
            host,
            port,
            max_connections,
        })
    }
}

impl ProviderConfig {
    /// Connection string template with the database left open
    pub fn template(&self) -> Result<DsnTemplate> {
        DsnTemplate::new(&self.username, &self.password, &self.host, self.port)
            .context("Invalid connection settings")
    }

    /// Registry opening real pooled MySQL connections
    pub fn registry(&self) -> Result<Arc<ConnectionRegistry>> {
        let template = self.template()?;
        log::debug!("Connecting to {} through {template}", self.connection_name);
        Ok(Arc::new(ConnectionRegistry::new(
            template,
            Box::new(MySqlOpener::new(self.max_connections)),
        )))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("connection_name", &self.connection_name)
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_from_environment_with_defaults() {
        let config = ProviderSettings::default()
            .resolve_with(env(&[
                (ENV_CONNECTION_NAME, "my-project:europe-west1:db-1"),
                (ENV_USERNAME, "admin"),
                (ENV_PASSWORD, "secret"),
            ]))
            .unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_manifest_values_win() {
        let settings = ProviderSettings {
            connection_name: Some("p:r:i".into()),
            username: Some("manifest-user".into()),
            password: Some("pw".into()),
            port: Some(3307),
            ..Default::default()
        };
        let config = settings
            .resolve_with(env(&[(ENV_USERNAME, "env-user"), (ENV_PORT, "9999")]))
            .unwrap();
        assert_eq!(config.username, "manifest-user");
        assert_eq!(config.port, 3307);
    }

    #[test]
    fn test_every_problem_is_reported() {
        let settings = ProviderSettings {
            connection_name: Some("Not A Name".into()),
            ..Default::default()
        };
        let err = settings
            .resolve_with(env(&[(ENV_PORT, "http")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("4 problem(s)"), "{err}");
        assert!(err.contains("<project>:<region>:<instance>"));
        assert!(err.contains("username is required"));
        assert!(err.contains("password is required"));
        assert!(err.contains("is not a valid port"));
    }

    #[test]
    fn test_debug_masks_password() {
        let config = ProviderSettings {
            connection_name: Some("p:r:i".into()),
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        }
        .resolve_with(env(&[]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_connection_targets_proxy_address() {
        let config = ProviderSettings {
            connection_name: Some("my-project:europe-west1:db-1".into()),
            username: Some("admin".into()),
            password: Some("pw".into()),
            host: Some("10.0.0.5".into()),
            port: Some(3307),
            ..Default::default()
        }
        .resolve_with(env(&[]))
        .unwrap();
        let dsn = config.template().unwrap().resolve("app");
        assert_eq!(dsn, "mysql://admin:pw@10.0.0.5:3307/app");
        assert!(!dsn.contains("db-1"));
    }

    #[test]
    fn test_state_path_beside_manifest() {
        let path = state_path(None, Path::new("/srv/infra/cloudsqlmysql.toml")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/infra").join(STATE_FILE));
        let explicit = state_path(Some("/tmp/other.json"), Path::new("x.toml")).unwrap();
        assert_eq!(explicit, PathBuf::from("/tmp/other.json"));
    }
}
