//! `database <name>`: look up an existing database without managing it

use anyhow::{Context as AnyhowContext, Result};
use mysqlkit::database::{self, SchemaInfo};
use mysqlkit::{CallContext, ConnectionRegistry};
use std::sync::Arc;

use crate::Context;
use crate::cli::DatabaseArgs;
use crate::config::{self, ProviderConfig, ProviderSettings};
use crate::progress;
use crate::schema::Manifest;
use crate::ui;

/// Provider settings from the manifest, or from the environment alone when
/// no manifest was asked for and none is found
fn provider(ctx: &Context) -> Result<ProviderConfig> {
    match config::manifest_path(ctx.manifest.as_deref()) {
        Ok(path) => Manifest::load(&path)?.provider.resolve(),
        Err(e) if ctx.manifest.is_none() => {
            log::debug!("{e}; using provider settings from the environment");
            ProviderSettings::default().resolve()
        }
        Err(e) => Err(e),
    }
}

pub async fn run(ctx: &Context, args: DatabaseArgs) -> Result<()> {
    mysqlkit::validate_database_name(&args.name)?;
    let registry = provider(ctx)?.registry()?;
    let apply_ctx = ctx.apply_context(false);
    let call = CallContext::new(apply_ctx.cancel_receiver(), apply_ctx.deadline());

    let pb = (!ctx.quiet && !args.json)
        .then(|| progress::spinner(&format!("Looking up database {}...", args.name)));
    let result = lookup(&registry, &call, &args.name).await;
    let info = match (result, pb) {
        (Ok(info), Some(pb)) => {
            progress::finish_success(&pb, &format!("Found database {}", info.name));
            info
        }
        (Err(e), Some(pb)) => {
            progress::finish_error(&pb, &format!("Lookup of {} failed", args.name));
            return Err(e);
        }
        (result, None) => result?,
    };

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to render database")?;
        println!("{json}");
    } else {
        ui::kv("Name", &info.name);
        ui::kv("Character set", &info.character_set);
        ui::kv("Collation", &info.collation);
    }
    Ok(())
}

async fn lookup(
    registry: &Arc<ConnectionRegistry>,
    call: &CallContext,
    name: &str,
) -> Result<SchemaInfo> {
    let handle = registry.acquire_database("")?;
    Ok(database::lookup(&*handle, call, name).await?)
}
