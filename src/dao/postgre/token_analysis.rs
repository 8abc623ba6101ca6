use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};

use crate::{
    dao::AnalysisRepository,
    error::Error,
    model::{
        AnalysisHistory, Chain, Holder, HolderLink, LastError,
        SupplyDistribution, Table, TokenAnalysis, TokenLink,
    },
};

#[derive(Debug, FromRow)]
struct TokenAnalysisRow {
    address: String,
    chain: String,
    name: String,
    symbol: String,
    version: i32,
    is_nft: bool,
    decentralization_score: f64,
    supply_distribution: Json<SupplyDistribution>,
    holders: Json<Vec<Holder>>,
    holder_links: Json<Vec<HolderLink>>,
    related_tokens: Json<Vec<TokenLink>>,
    last_analysis: DateTime<Utc>,
    next_update_due: DateTime<Utc>,
    analysis_history: Json<AnalysisHistory>,
    screenshot_url: Option<String>,
    screenshot_last_update: Option<DateTime<Utc>>,
    last_error: Option<Json<LastError>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TokenAnalysisRow> for TokenAnalysis {
    type Error = Error;

    fn try_from(row: TokenAnalysisRow) -> Result<Self, Self::Error> {
        Ok(TokenAnalysis {
            address: row.address,
            chain: row.chain.parse()?,
            name: row.name,
            symbol: row.symbol,
            version: row.version,
            is_nft: row.is_nft,
            decentralization_score: row.decentralization_score,
            supply_distribution: row.supply_distribution.0,
            holders: row.holders.0,
            holder_links: row.holder_links.0,
            related_tokens: row.related_tokens.0,
            last_analysis: row.last_analysis,
            next_update_due: row.next_update_due,
            analysis_history: row.analysis_history.0,
            screenshot_url: row.screenshot_url,
            screenshot_last_update: row.screenshot_last_update,
            last_error: row.last_error.map(|error| error.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_analyses(rows: Vec<TokenAnalysisRow>) -> Result<Vec<TokenAnalysis>, Error> {
    rows.into_iter().map(TokenAnalysis::try_from).collect()
}

impl Table<TokenAnalysis> {
    pub async fn count(&self) -> Result<i64, Error> {
        let (count,) = sqlx::query_as(
            r#"
             SELECT COUNT(1) FROM "token_analysis"
            "#,
        )
        .persistent(true)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl AnalysisRepository for Table<TokenAnalysis> {
    async fn find(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<TokenAnalysis>, Error> {
        let row: Option<TokenAnalysisRow> = sqlx::query_as(
            r#"
            SELECT * FROM "token_analysis" WHERE "address" = $1 AND "chain" = $2
            "#,
        )
        .bind(address)
        .bind(chain.as_str())
        .persistent(true)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenAnalysis::try_from).transpose()
    }

    async fn save(&self, analysis: &TokenAnalysis) -> Result<(), Error> {
        analysis.check_bounds()?;

        sqlx::query(
            r#"
            INSERT INTO "token_analysis" (
                "address",
                "chain",
                "name",
                "symbol",
                "version",
                "is_nft",
                "decentralization_score",
                "supply_distribution",
                "holders",
                "holder_links",
                "related_tokens",
                "last_analysis",
                "next_update_due",
                "analysis_history",
                "screenshot_url",
                "screenshot_last_update",
                "last_error",
                "created_at",
                "updated_at"
            )
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT ("address", "chain") DO UPDATE SET
                "name" = EXCLUDED."name",
                "symbol" = EXCLUDED."symbol",
                "version" = EXCLUDED."version",
                "is_nft" = EXCLUDED."is_nft",
                "decentralization_score" = EXCLUDED."decentralization_score",
                "supply_distribution" = EXCLUDED."supply_distribution",
                "holders" = EXCLUDED."holders",
                "holder_links" = EXCLUDED."holder_links",
                "related_tokens" = EXCLUDED."related_tokens",
                "last_analysis" = EXCLUDED."last_analysis",
                "next_update_due" = EXCLUDED."next_update_due",
                "analysis_history" = EXCLUDED."analysis_history",
                "screenshot_url" = EXCLUDED."screenshot_url",
                "screenshot_last_update" = EXCLUDED."screenshot_last_update",
                "last_error" = EXCLUDED."last_error",
                "updated_at" = EXCLUDED."updated_at"
            "#,
        )
        .bind(&analysis.address)
        .bind(analysis.chain.as_str())
        .bind(&analysis.name)
        .bind(&analysis.symbol)
        .bind(analysis.version)
        .bind(analysis.is_nft)
        .bind(analysis.decentralization_score)
        .bind(Json(&analysis.supply_distribution))
        .bind(Json(&analysis.holders))
        .bind(Json(&analysis.holder_links))
        .bind(Json(&analysis.related_tokens))
        .bind(analysis.last_analysis)
        .bind(analysis.next_update_due)
        .bind(Json(&analysis.analysis_history))
        .bind(&analysis.screenshot_url)
        .bind(analysis.screenshot_last_update)
        .bind(analysis.last_error.as_ref().map(Json))
        .bind(analysis.created_at)
        .bind(analysis.updated_at)
        .persistent(true)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn due_for_update(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TokenAnalysis>, Error> {
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM "token_analysis"
            WHERE "next_update_due" <= $1
            ORDER BY "next_update_due" ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .persistent(true)
        .fetch_all(&self.pool)
        .await?;

        into_analyses(rows)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<TokenAnalysis>, Error> {
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM "token_analysis"
            ORDER BY "last_analysis" DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .persistent(true)
        .fetch_all(&self.pool)
        .await?;

        into_analyses(rows)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM "token_analysis" WHERE "updated_at" < $1
            "#,
        )
        .bind(cutoff)
        .persistent(true)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_screenshot(
        &self,
        address: &str,
        chain: Chain,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE "token_analysis"
            SET "screenshot_url" = $3, "screenshot_last_update" = $4, "updated_at" = $4
            WHERE "address" = $1 AND "chain" = $2
            "#,
        )
        .bind(address)
        .bind(chain.as_str())
        .bind(url)
        .bind(at)
        .persistent(true)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "analysis for {} on {}",
                address, chain
            )));
        }

        Ok(())
    }
}
