use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use nt_core::{FenceMarkers, SystemClock};
use nt_vault::{SyncEngine, VaultStore};
use tracing_subscriber::EnvFilter;

use nt_cli::commands::report::ReportFormat;
use nt_cli::commands::track::StartOptions;
use nt_cli::commands::{list, report, show, status, stop_all, track, util};
use nt_cli::{Cli, Commands, Config};

type Engine = SyncEngine<VaultStore, SystemClock>;

/// Load config and open the vault, which must already exist.
fn open_vault(config_path: Option<&Path>) -> Result<(Engine, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    config.validate().context("invalid configuration")?;

    if !config.vault_path.is_dir() {
        anyhow::bail!("vault directory {} does not exist", config.vault_path.display());
    }

    let engine = SyncEngine::new(VaultStore::new(&config.vault_path), SystemClock)
        .with_markers(FenceMarkers::for_language(&config.fence_language));
    Ok((engine, config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (engine, config) = open_vault(cli.config.as_deref())?;
    let mut out = std::io::stdout().lock();

    match command {
        Commands::List => list::run(&mut out, &engine).await?,
        Commands::Status => status::run(&mut out, &engine, &config, &Local).await?,
        Commands::Show { target, csv } => {
            show::run(&mut out, &engine, &config, &target, csv, &Local).await?;
        }
        Commands::New { document } => track::new(&mut out, &engine, &document).await?,
        Commands::Start {
            target,
            name,
            project,
            client,
            stop_others,
        } => {
            let options = StartOptions {
                name,
                project,
                client,
                stop_others,
            };
            track::start(&mut out, &engine, &target, options).await?;
        }
        Commands::Stop { target } => track::stop(&mut out, &engine, &target).await?,
        Commands::Continue {
            target,
            entry,
            name,
        } => track::continue_entry(&mut out, &engine, &target, &entry, name).await?,
        Commands::Remove { target, entry } => {
            track::remove(&mut out, &engine, &target, &entry).await?;
        }
        Commands::Rename {
            target,
            entry,
            name,
        } => track::rename(&mut out, &engine, &target, &entry, &name).await?,
        Commands::StopAll => stop_all::run(&mut out, &engine).await?,
        Commands::Report {
            from,
            to,
            json,
            entries,
        } => {
            let today = Local::now().date_naive();
            let from = util::parse_date(&from, today)?;
            let to = match to {
                Some(to) => util::parse_date(&to, today)?,
                None => from,
            };
            let format = if json {
                ReportFormat::Json
            } else if entries {
                ReportFormat::Entries
            } else {
                ReportFormat::Grid
            };
            report::run(
                &mut out,
                &engine,
                (from, to),
                format,
                &config.timestamp_format,
                &Local,
            )
            .await?;
        }
    }

    out.flush()?;
    Ok(())
}
