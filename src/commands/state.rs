//! `state list` and `state show`

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::Address;
use std::path::PathBuf;

use crate::Context;
use crate::config;
use crate::state::StateFile;
use crate::ui;

/// State file for this invocation; `--state` alone needs no manifest
fn state_file(ctx: &Context) -> Result<PathBuf> {
    match ctx.state.as_deref() {
        Some(path) => config::expand_path(path),
        None => {
            let manifest = config::manifest_path(ctx.manifest.as_deref())?;
            config::state_path(None, &manifest)
        }
    }
}

fn read(ctx: &Context) -> Result<Option<StateFile>> {
    let path = state_file(ctx)?;
    if !path.exists() {
        ui::info(&format!("No state recorded at {}", path.display()));
        return Ok(None);
    }
    StateFile::read(&path).map(Some)
}

pub fn list(ctx: &Context) -> Result<()> {
    let Some(state) = read(ctx)? else {
        return Ok(());
    };

    ui::header("Recorded resources");
    ui::kv("Connection", &state.connection_name);
    ui::kv("Serial", &state.serial.to_string());
    ui::kv(
        "Updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    println!();

    if state.resources.is_empty() {
        ui::dim("(empty)");
        return Ok(());
    }
    for address in state.resources.keys() {
        println!("  {}", address.bold());
    }
    println!();
    ui::dim(&ui::count(state.resources.len(), "resource"));
    Ok(())
}

pub fn show(ctx: &Context, address: &str) -> Result<()> {
    let Some(parsed) = Address::parse(address) else {
        bail!("Invalid address '{address}': expected <type>.<name>");
    };
    let Some(state) = read(ctx)? else {
        return Ok(());
    };
    let Some(recorded) = state.get(&parsed) else {
        bail!("{address} is not recorded in state");
    };

    let attributes = serde_json::to_string_pretty(&recorded.attributes)
        .context("Failed to render attributes")?;
    ui::header(address);
    ui::kv("Type", &recorded.type_name);
    println!("{attributes}");
    Ok(())
}
