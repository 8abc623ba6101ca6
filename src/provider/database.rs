use tracing::info;

use crate::{
    configuration::Config,
    dao::{get_path, PoolOption, PoolType},
    error::Error,
    model::{Table, TokenAnalysis},
};

const MIGRATIONS: [&str; 1] = ["token_analysis.sql"];

#[derive(Debug)]
pub struct DatabasePool {
    pub token_analysis: Table<TokenAnalysis>,
    pub pool: PoolType,
}

impl DatabasePool {
    pub async fn new(database_url: &str, config: &Config) -> Result<DatabasePool, Error> {
        let pool = PoolOption::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await?;

        Ok(DatabasePool {
            token_analysis: Table::new(pool.clone()),
            pool,
        })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        let dir = env!("CARGO_MANIFEST_DIR");

        for file in MIGRATIONS {
            let data = get_path(dir, file)?;
            sqlx::raw_sql(&data).execute(&self.pool).await?;
            info!("Applied {}", file);
        }

        Ok(())
    }
}
