//! CLI module for the holder map service
//!
//! `serve` runs the background tasks. The other commands perform a single
//! operation against the configured store and exit.

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};

use crate::{
    cache::sweep_task,
    configuration::{get_configuration, set_configuration, AppState, Config, State},
    error::Error,
    handler::{
        refresh_task::{prune_task, refresh_task},
        ArtifactKind,
    },
    model::{Chain, TokenAnalysis},
    provider::DatabasePool,
};

/// Token holder analysis and bubble map renderer
#[derive(Parser)]
#[command(name = "holdermap")]
#[command(about = "Token holder graph analysis and bubble map rendering", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the background refresh, prune and cache sweep tasks (default)
    Serve,

    /// Fetch the analysis for a token, refreshing it when stale
    Analyze {
        #[arg(long)]
        address: String,

        #[arg(long)]
        chain: String,

        /// Also render the bubble map to this file
        #[arg(long)]
        render: Option<PathBuf>,
    },

    /// Refresh a stored analysis regardless of its freshness
    ForceUpdate {
        #[arg(long)]
        address: String,

        #[arg(long)]
        chain: String,
    },

    /// Render an artifact for a token to a PNG file
    Render {
        #[arg(long)]
        address: String,

        #[arg(long)]
        chain: String,

        #[arg(long, value_enum, default_value_t = Kind::Map)]
        kind: Kind,

        #[arg(long)]
        output: PathBuf,
    },

    /// List the most recently analyzed tokens
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Create the database schema
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Map,
    Card,
}

impl From<Kind> for ArtifactKind {
    fn from(kind: Kind) -> ArtifactKind {
        match kind {
            Kind::Map => ArtifactKind::Map,
            Kind::Card => ArtifactKind::Card,
        }
    }
}

/// Initialize configuration and return Config
pub fn init_config() -> Result<Config, Error> {
    set_configuration()?;
    get_configuration()
}

async fn init_state() -> Result<AppState<State>, Error> {
    let config = init_config()?;
    let state = State::new(config).await?;
    Ok(AppState::new(state))
}

pub async fn run(command: Commands) -> Result<(), Error> {
    match command {
        Commands::Serve => run_serve().await,
        Commands::Analyze {
            address,
            chain,
            render,
        } => run_analyze(&address, &chain, render).await,
        Commands::ForceUpdate { address, chain } => run_force_update(&address, &chain).await,
        Commands::Render {
            address,
            chain,
            kind,
            output,
        } => run_render(&address, &chain, kind.into(), output).await,
        Commands::Recent { limit } => run_recent(limit).await,
        Commands::Migrate => run_migrate().await,
    }
}

pub async fn run_serve() -> Result<(), Error> {
    let app_state = init_state().await?;
    let period = Duration::from_secs(app_state.config.artifact_check_period);
    let cache = app_state.artifacts.cache().clone();

    tracing::info!("Holder map service started");

    let (_, _, _) = tokio::try_join!(
        refresh_task(app_state.clone()),
        prune_task(app_state.clone()),
        sweep_task(cache, period),
    )?;

    Ok(())
}

pub async fn run_analyze(
    address: &str,
    chain: &str,
    render: Option<PathBuf>,
) -> Result<(), Error> {
    let chain = Chain::from_str(chain)?;
    let app_state = init_state().await?;

    let analysis = match render {
        Some(output) => {
            let report = app_state
                .artifacts
                .report(&app_state.store, address, chain)
                .await?;
            match (&report.map, &report.render_error) {
                (Some(_), _) => {
                    let url = app_state
                        .artifacts
                        .export(&app_state.store, &report.analysis, ArtifactKind::Map, &output)
                        .await?;
                    tracing::info!("Bubble map written to {}", url);
                },
                (None, Some(e)) => tracing::warn!("Bubble map not rendered: {}", e),
                (None, None) => {},
            }
            report.analysis
        },
        None => app_state.store.get_analysis(address, chain).await?,
    };

    print_analysis(&analysis)
}

pub async fn run_force_update(address: &str, chain: &str) -> Result<(), Error> {
    let chain = Chain::from_str(chain)?;
    let app_state = init_state().await?;
    let analysis = app_state.store.force_update(address, chain).await?;
    print_analysis(&analysis)
}

pub async fn run_render(
    address: &str,
    chain: &str,
    kind: ArtifactKind,
    output: PathBuf,
) -> Result<(), Error> {
    let chain = Chain::from_str(chain)?;
    let app_state = init_state().await?;

    let analysis = app_state.store.get_analysis(address, chain).await?;
    let url = app_state
        .artifacts
        .export(&app_state.store, &analysis, kind, &output)
        .await?;

    println!("{}", url);
    Ok(())
}

pub async fn run_recent(limit: usize) -> Result<(), Error> {
    let app_state = init_state().await?;

    for analysis in app_state.store.recent(limit).await? {
        println!(
            "{}\t{}\t{}\t{:.2}\t{}",
            analysis.chain,
            analysis.address,
            analysis.symbol,
            analysis.decentralization_score,
            analysis.last_analysis.to_rfc3339()
        );
    }

    Ok(())
}

pub async fn run_migrate() -> Result<(), Error> {
    let config = init_config()?;
    let url = config.database_url.as_deref().ok_or_else(|| {
        Error::ConfigurationError(String::from("DATABASE_URL is required to migrate"))
    })?;

    tracing::info!("Running database migrations...");
    let database = DatabasePool::new(url, &config).await?;
    database.migrate().await?;
    let stored = database.token_analysis.count().await?;
    tracing::info!("Migrations complete, {} analyses stored", stored);

    Ok(())
}

fn print_analysis(analysis: &TokenAnalysis) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(analysis)?);
    Ok(())
}
