use crate::database::models::{
    IndexCompositionEntry, IndexPerformanceRecord, PriceObservation, TickerMetadata,
};
use crate::database::schema;
use crate::database::store::IndexStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::info;

pub struct PostgresManager {
    pool: PgPool,
}

impl PostgresManager {
    pub async fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        dbname: &str,
        max_connections: usize,
    ) -> Result<Self> {
        let connection_string = format!(
            "postgres://{}:{}@{}:{}/{}",
            user, password, host, port, dbname
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections as u32)
            .connect(&connection_string)
            .await
            .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl IndexStore for PostgresManager {
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(schema::CREATE_TICKER_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_PRICE_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_COMPOSITION_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_PERFORMANCE_TABLE)
            .execute(&self.pool)
            .await?;

        for statement in schema::CREATE_INDICES.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }

        info!("Database tables initialized successfully");
        Ok(())
    }

    async fn upsert_ticker_metadata(&self, rows: &[TickerMetadata]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO ticker
                (ticker, company_name, exchange, active, shares_outstanding, weight)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (ticker) DO UPDATE SET
                    company_name = EXCLUDED.company_name,
                    exchange = EXCLUDED.exchange,
                    active = EXCLUDED.active,
                    shares_outstanding = EXCLUDED.shares_outstanding,
                    weight = EXCLUDED.weight",
            )
            .bind(&row.ticker)
            .bind(&row.company_name)
            .bind(&row.exchange)
            .bind(row.active)
            .bind(row.shares_outstanding)
            .bind(row.weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_ticker_metadata(&self) -> Result<Vec<TickerMetadata>> {
        let rows = sqlx::query_as::<_, TickerMetadata>(
            "SELECT ticker, company_name, exchange, active, shares_outstanding, weight
            FROM ticker
            ORDER BY ticker",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn upsert_prices(&self, rows: &[PriceObservation]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO price (date, ticker, close_price, market_cap)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (date, ticker) DO UPDATE SET
                    close_price = EXCLUDED.close_price,
                    market_cap = EXCLUDED.market_cap",
            )
            .bind(row.date)
            .bind(&row.ticker)
            .bind(row.close_price)
            .bind(row.market_cap)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_prices_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query_as::<_, PriceObservation>(
            "SELECT date, ticker, close_price, market_cap
            FROM price
            WHERE date BETWEEN $1 AND $2
            ORDER BY date, ticker",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_all_composition(&self) -> Result<()> {
        sqlx::query("DELETE FROM index_composition")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_composition(&self, rows: &[IndexCompositionEntry]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query("INSERT INTO index_composition (date, ticker, weight) VALUES ($1, $2, $3)")
                .bind(row.date)
                .bind(&row.ticker)
                .bind(row.weight)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_composition(&self, date: NaiveDate) -> Result<Vec<IndexCompositionEntry>> {
        let rows = sqlx::query_as::<_, IndexCompositionEntry>(
            "SELECT date, ticker, weight
            FROM index_composition
            WHERE date = $1
            ORDER BY weight DESC, ticker",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn prev_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT MAX(date) FROM index_composition WHERE date < $1")
            .bind(date)
            .fetch_one(&self.pool)
            .await?;

        let prev: Option<NaiveDate> = row.get(0);
        Ok(prev)
    }

    async fn get_close_pair(
        &self,
        ticker: &str,
        date: NaiveDate,
        prev_date: NaiveDate,
    ) -> Result<Option<(f64, f64)>> {
        let row = sqlx::query(
            "SELECT t.close_price, p.close_price
            FROM price t
            JOIN price p ON t.ticker = p.ticker
            WHERE t.ticker = $1
              AND t.date = $2
              AND p.date = $3",
        )
        .bind(ticker)
        .bind(date)
        .bind(prev_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| (r.get(0), r.get(1))))
    }

    async fn upsert_performance(&self, record: &IndexPerformanceRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO index_performance (date, daily_return, cumulative_return)
            VALUES ($1, $2, $3)
            ON CONFLICT (date) DO UPDATE SET
                daily_return = EXCLUDED.daily_return,
                cumulative_return = EXCLUDED.cumulative_return",
        )
        .bind(record.date)
        .bind(record.daily_return)
        .bind(record.cumulative_return)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_performance(&self, date: NaiveDate) -> Result<Option<IndexPerformanceRecord>> {
        let record = sqlx::query_as::<_, IndexPerformanceRecord>(
            "SELECT date, daily_return, cumulative_return
            FROM index_performance
            WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_all_performance(&self) -> Result<()> {
        sqlx::query("DELETE FROM index_performance")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
