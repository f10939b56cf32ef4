use anyhow::Result;
use std::collections::BTreeMap;

use crate::Context;
use crate::engine::Session;
use crate::ui;

/// Check the manifest and provider settings without touching the server
pub fn run(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let desired = declarative::prepare_desired(&session.types, session.desired()?)?;

    if ctx.quiet {
        return Ok(());
    }

    ui::success(&format!("{} is valid", session.manifest_path.display()));
    ui::kv("Connection", &session.provider.connection_name);
    ui::kv(
        "Endpoint",
        &format!("{}:{}", session.provider.host, session.provider.port),
    );

    let mut per_type: BTreeMap<&str, usize> = BTreeMap::new();
    for address in desired.keys() {
        *per_type.entry(address.type_name.as_str()).or_default() += 1;
    }
    for (type_name, count) in per_type {
        ui::kv(type_name, &count.to_string());
    }
    if desired.is_empty() {
        ui::dim("No resources declared");
    }
    Ok(())
}
