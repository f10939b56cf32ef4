mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod resource;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, StateCommand};
use declarative::{ApplyContext, Cancellation};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `-f` manifest path, if given
    pub manifest: Option<String>,
    /// `--state` path, if given
    pub state: Option<String>,
    pub timeout: Option<Duration>,
    /// Fired by Ctrl-C
    pub cancellation: Arc<Cancellation>,
}

impl Context {
    /// Context for one round of lifecycle operations
    pub fn apply_context(&self, dry_run: bool) -> ApplyContext {
        let ctx = ApplyContext::new(&self.cancellation, dry_run, self.verbose > 0);
        match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let cancellation = Arc::new(Cancellation::new());
    {
        let cancellation = Arc::clone(&cancellation);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling in-flight operations");
                cancellation.cancel();
            }
        });
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        manifest: cli.manifest,
        state: cli.state,
        timeout: cli.timeout.map(Duration::from_secs),
        cancellation,
    };

    match run(&ctx, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Validate => commands::validate::run(ctx),
        Command::Plan(args) => commands::plan::run(ctx, args).await,
        Command::Apply(args) => commands::apply::apply(ctx, args).await,
        Command::Refresh(args) => commands::refresh::run(ctx, args).await,
        Command::Destroy(args) => commands::apply::destroy(ctx, args).await,
        Command::State(cmd) => match cmd {
            StateCommand::List => commands::state::list(ctx),
            StateCommand::Show { address } => commands::state::show(ctx, &address),
        },
        Command::Database(args) => commands::database::run(ctx, args).await,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cloudsqlmysql", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print an error with its causes, plus advice when a database error is involved
fn report(error: &anyhow::Error) {
    ui::error(&format!("{error:#}"));
    if let Some(db_error) = error.chain().find_map(|e| e.downcast_ref::<mysqlkit::Error>()) {
        eprintln!("  {}", db_error.category().advice());
    }
}
