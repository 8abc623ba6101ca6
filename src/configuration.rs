use std::{
    env, fs,
    ops::Deref,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use tracing::{debug, info};

use crate::{
    cache::ArtifactCache,
    dao::{AnalysisRepository, MemoryRepository},
    error::Error,
    handler::{AnalysisStore, Artifacts, StoreSettings},
    helpers::SystemClock,
    model::{Table, TokenAnalysis, MAX_HOLDERS, MAX_HOLDER_LINKS},
    provider::{BubblemapsClient, DatabasePool},
    render::{BubbleMapOptions, BubbleMapRenderer, CardOptions, CardRenderer, Rasterizer},
    types::SnapshotLimits,
};

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

pub struct State {
    pub config: Config,
    pub store: AnalysisStore,
    pub artifacts: Artifacts,
    pub database: Option<DatabasePool>,
}

impl State {
    /// Wires the process-wide services. Analyses live in Postgres when
    /// `DATABASE_URL` is set, otherwise in memory.
    pub async fn new(config: Config) -> Result<State, Error> {
        let database = match &config.database_url {
            Some(url) => {
                let database = DatabasePool::new(url, &config).await?;
                database.migrate().await?;
                Some(database)
            },
            None => None,
        };

        let repository: Arc<dyn AnalysisRepository> = match &database {
            Some(database) => {
                info!("Storing analyses in Postgres");
                Arc::new(Table::<TokenAnalysis>::new(database.pool.clone()))
            },
            None => {
                info!("DATABASE_URL not set, storing analyses in memory");
                Arc::new(MemoryRepository::new())
            },
        };

        let provider = Arc::new(BubblemapsClient::new(&config)?);
        let store = AnalysisStore::new(
            repository,
            provider,
            Arc::new(SystemClock),
            config.store_settings(),
        );

        let rasterizer = Arc::new(Rasterizer::new());
        debug!("Loaded {} fonts", rasterizer.font_count());

        let artifacts = Artifacts::new(
            Arc::new(ArtifactCache::new(Duration::from_secs(config.artifact_ttl))),
            BubbleMapRenderer::new(config.bubble_map_options(), rasterizer.clone()),
            CardRenderer::new(CardOptions::default(), rasterizer),
        );

        Ok(State {
            config,
            store,
            artifacts,
            database,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub provider_url: String,
    pub provider_api_key: Option<String>,
    pub timeout: u64,
    pub freshness_window_hours: i64,
    pub max_holders: usize,
    pub max_holder_links: usize,
    pub single_flight: bool,
    pub artifact_ttl: u64,
    pub artifact_check_period: u64,
    pub refresh_interval: u64,
    pub refresh_batch_size: usize,
    pub max_concurrent_refreshes: usize,
    pub retention_days: i64,
    pub map_width: u32,
    pub map_height: u32,
}

impl Config {
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            freshness_window: chrono::Duration::hours(self.freshness_window_hours),
            limits: SnapshotLimits {
                max_holders: self.max_holders,
                max_holder_links: self.max_holder_links,
            },
            single_flight: self.single_flight,
        }
    }

    pub fn bubble_map_options(&self) -> BubbleMapOptions {
        BubbleMapOptions {
            width: self.map_width,
            height: self.map_height,
            ..BubbleMapOptions::default()
        }
    }

    /// Builds a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Config {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 20)?,
            provider_url: get("PROVIDER_URL")
                .unwrap_or_else(|| String::from("https://api-legacy.bubblemaps.io")),
            provider_api_key: get("PROVIDER_API_KEY"),
            timeout: parse_or(&get, "TIMEOUT", 30)?,
            freshness_window_hours: parse_or(&get, "FRESHNESS_WINDOW_IN_HOURS", 24)?,
            max_holders: parse_or(&get, "MAX_HOLDERS", MAX_HOLDERS)?,
            max_holder_links: parse_or(&get, "MAX_HOLDER_LINKS", MAX_HOLDER_LINKS)?,
            single_flight: parse_or(&get, "REFRESH_SINGLE_FLIGHT", true)?,
            artifact_ttl: parse_or(&get, "ARTIFACT_CACHE_TTL_IN_SECONDS", 3600)?,
            artifact_check_period: parse_or(&get, "ARTIFACT_CACHE_CHECK_PERIOD_IN_SECONDS", 600)?,
            refresh_interval: parse_or(&get, "REFRESH_INTERVAL_IN_SECONDS", 300)?,
            refresh_batch_size: parse_or(&get, "REFRESH_BATCH_SIZE", 10)?,
            max_concurrent_refreshes: parse_or(&get, "MAX_CONCURRENT_REFRESHES", 4)?,
            retention_days: parse_or(&get, "RETENTION_DAYS", 30)?,
            map_width: parse_or(&get, "MAP_WIDTH", 1200)?,
            map_height: parse_or(&get, "MAP_HEIGHT", 800)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_holders > MAX_HOLDERS {
            return Err(Error::ConfigurationError(format!(
                "MAX_HOLDERS must be at most {}",
                MAX_HOLDERS
            )));
        }
        if self.max_holder_links > MAX_HOLDER_LINKS {
            return Err(Error::ConfigurationError(format!(
                "MAX_HOLDER_LINKS must be at most {}",
                MAX_HOLDER_LINKS
            )));
        }
        if self.freshness_window_hours <= 0 {
            return Err(Error::ConfigurationError(String::from(
                "FRESHNESS_WINDOW_IN_HOURS must be positive",
            )));
        }
        if self.refresh_interval == 0 || self.artifact_check_period == 0 {
            return Err(Error::ConfigurationError(String::from(
                "task intervals must be positive",
            )));
        }

        Ok(())
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    Error: From<T::Err>,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => Ok(value.trim().parse()?),
        None => Ok(default),
    }
}

pub fn get_configuration() -> Result<Config, Error> {
    Config::from_lookup(|key| env::var(key).ok())
}

/// Loads `.env` from the manifest directory and then the working directory
/// into the process environment. Variables already set are left untouched.
pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";

    let candidates = [
        Path::new(env!("CARGO_MANIFEST_DIR")).join(config_file),
        PathBuf::from(config_file),
    ];

    for path in candidates.iter().filter(|path| path.is_file()) {
        let config_string = fs::read_to_string(path)?;
        for (key, value) in parse_config_string(&config_string) {
            if env::var_os(&key).is_none() {
                env::set_var(key, value);
            }
        }
        debug!("Loaded configuration from {}", path.display());
    }

    Ok(())
}

fn parse_config_string(config: &str) -> Vec<(String, String)> {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_owned(), value.to_owned())
        })
        .collect()
}
