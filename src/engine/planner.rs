//! Session: manifest, provider, state and resource types for one command

use crate::Context;
use crate::config::{self, ProviderConfig};
use crate::progress::BarProgress;
use crate::resource;
use crate::schema::Manifest;
use crate::state::StateFile;
use anyhow::{Context as AnyhowContext, Result};
use declarative::{
    Address, ApplyContext, ExecutionPlan, RefreshReport, ResourceData, ResourceTypes,
};
use mysqlkit::ConnectionRegistry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a planning command works on
pub struct Session {
    pub manifest_path: PathBuf,
    pub state_path: PathBuf,
    pub manifest: Manifest,
    pub provider: ProviderConfig,
    pub state: StateFile,
    pub types: ResourceTypes,
    /// State changed in memory since it was loaded
    dirty: bool,
}

impl Session {
    /// Load manifest, provider settings and state; connect lazily
    pub fn open(ctx: &Context) -> Result<Self> {
        let manifest_path = config::manifest_path(ctx.manifest.as_deref())?;
        let state_path = config::state_path(ctx.state.as_deref(), &manifest_path)?;
        let manifest = Manifest::load(&manifest_path)?;
        log::debug!(
            "Declared types: {}",
            manifest.type_names().collect::<Vec<_>>().join(", ")
        );
        let provider = manifest.provider.resolve()?;
        let registry = provider.registry()?;
        Self::with_registry(manifest_path, state_path, manifest, provider, &registry)
    }

    /// Build a session on an existing connection registry
    pub fn with_registry(
        manifest_path: PathBuf,
        state_path: PathBuf,
        manifest: Manifest,
        provider: ProviderConfig,
        registry: &Arc<ConnectionRegistry>,
    ) -> Result<Self> {
        let state = StateFile::load(&state_path, &provider.connection_name)?;
        log::info!(
            "Using manifest {} and state {}",
            manifest_path.display(),
            state_path.display()
        );
        Ok(Self {
            manifest_path,
            state_path,
            manifest,
            provider,
            state,
            types: resource::resource_types(registry),
            dirty: false,
        })
    }

    /// Declared instances
    pub fn desired(&self) -> Result<BTreeMap<Address, ResourceData>> {
        self.manifest.desired()
    }

    /// Recorded instances
    pub fn prior(&self) -> Result<BTreeMap<Address, ResourceData>> {
        self.state.instances()
    }

    /// Resolve connection handles for every resource type
    pub fn configure(&self) -> Result<()> {
        self.types
            .configure_all()
            .context("Failed to configure resource types")
    }

    /// Re-read every recorded instance from the server, in memory
    pub async fn refresh(
        &mut self,
        ctx: &ApplyContext,
        jobs: usize,
        progress: &mut BarProgress,
    ) -> Result<RefreshReport> {
        let prior = self.prior()?;
        if prior.is_empty() {
            return Ok(RefreshReport::default());
        }
        self.configure()?;
        let report = declarative::refresh(&self.types, prior.clone(), jobs, ctx, progress).await?;
        if report.state != prior {
            self.state.replace_instances(report.state.clone());
            self.dirty = true;
        }
        Ok(report)
    }

    /// Plan convergence of the (refreshed) state onto the manifest
    pub fn plan(&self, target: Option<&str>) -> Result<ExecutionPlan> {
        let plan = declarative::plan(&self.types, self.desired()?, self.prior()?)?;
        Ok(plan.filter_by_target(target))
    }

    /// Plan deletion of every recorded instance
    pub fn plan_destroy(&self, target: Option<&str>) -> Result<ExecutionPlan> {
        let plan = declarative::plan_destroy(&self.types, self.prior()?)?;
        Ok(plan.filter_by_target(target))
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write state if anything changed
    pub fn save_state(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.state.save(&self.state_path)?;
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use declarative::{Action, Cancellation};
    use mysqlkit::DsnTemplate;
    use mysqlkit::backend::Row;
    use mysqlkit::backend::scripted::{ScriptedHandle, ScriptedOpener};
    use serde_json::json;
    use tempfile::TempDir;

    pub const MANIFEST: &str = r#"
[provider]
connection_name = "my-project:europe-west1:main"
username = "admin"
password = "secret"

[role.readers]
name = "readers"

[grant.app_readers]
database = "app"
role = "readers"
privileges = ["SELECT"]
"#;

    pub fn session(dir: &TempDir, manifest: &str, handle: &ScriptedHandle) -> Session {
        let manifest = Manifest::parse(manifest).unwrap();
        let provider: ProviderConfig = manifest.provider.resolve_with(|_| None).unwrap();
        let template = DsnTemplate::new("admin", "secret", "127.0.0.1", 3306).unwrap();
        let registry = Arc::new(ConnectionRegistry::new(
            template,
            Box::new(ScriptedOpener::new(handle.clone())),
        ));
        Session::with_registry(
            dir.path().join("cloudsqlmysql.toml"),
            dir.path().join("state.json"),
            manifest,
            provider,
            &registry,
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_session_plans_creates() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir, MANIFEST, &ScriptedHandle::new());
        let plan = session.plan(None).unwrap();
        assert!(plan.diffs.iter().all(|d| d.action == Action::Create));
        assert_eq!(plan.total_resources(), 2);
        assert_eq!(session.plan(Some("role")).unwrap().total_resources(), 1);
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_instances() {
        let dir = TempDir::new().unwrap();
        let handle = ScriptedHandle::new();
        let mut session = session(&dir, MANIFEST, &handle);
        session.state.set(
            &Address::new("role", "readers"),
            declarative::ResourceData::from_map(
                json!({"name": "readers"}).as_object().cloned().unwrap(),
            ),
        );

        // SHOW GRANTS answers with no rows: the role is gone
        handle.push_rows(Vec::<Row>::new());
        let ctx = ApplyContext::new(&Cancellation::new(), false, false);
        let report = session
            .refresh(&ctx, 2, &mut BarProgress::hidden())
            .await
            .unwrap();

        assert_eq!(report.dropped, vec![Address::new("role", "readers")]);
        assert!(session.is_dirty());
        assert!(session.state.resources.is_empty());
        assert!(session.save_state().unwrap());
        assert!(session.state_path.exists());
    }

    #[test]
    fn test_state_for_other_connection_is_refused() {
        let dir = TempDir::new().unwrap();
        StateFile::new("other:region:db")
            .save(&dir.path().join("state.json"))
            .unwrap();

        let manifest = Manifest::parse(MANIFEST).unwrap();
        let provider = ProviderSettings {
            connection_name: Some("my-project:europe-west1:main".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        }
        .resolve_with(|_| None)
        .unwrap();
        let registry = provider.registry().unwrap();
        let result = Session::with_registry(
            dir.path().join("m.toml"),
            dir.path().join("state.json"),
            manifest,
            provider,
            &registry,
        );
        assert!(result.is_err());
    }
}
