use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::debug;
use std::sync::Arc;

use super::model::{format_day, PricePointDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::price_points;
use crate::schema::price_points::dsl as pp;
use pricevault_core::prices::{Day, PricePoint, PriceStore, Ticker};
use pricevault_core::Result;
use pricevault_market_data::Interval;

type SeriesQuery = price_points::BoxedQuery<'static, Sqlite>;

/// Rows per INSERT; 13 bound parameters each.
const UPSERT_CHUNK: usize = 500;

/// Durable price tier on SQLite.
pub struct PriceRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn series(ticker: &Ticker, interval: Interval) -> SeriesQuery {
        pp::price_points
            .filter(pp::ticker.eq(ticker.as_str().to_string()))
            .filter(pp::bar_interval.eq(interval.as_str()))
            .into_boxed()
    }

    fn first(&self, query: SeriesQuery) -> Result<Option<PricePoint>> {
        let mut conn = get_connection(&self.pool)?;
        query
            .order(pp::timestamp.desc())
            .first::<PricePointDB>(&mut conn)
            .optional()
            .into_core()?
            .map(PricePoint::try_from)
            .transpose()
    }
}

// =============================================================================
// PriceStore Implementation
// =============================================================================

#[async_trait]
impl PriceStore for PriceRepository {
    // =========================================================================
    // Mutations
    // =========================================================================

    async fn upsert_points(&self, points: &[PricePoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let rows: Vec<PricePointDB> = points.iter().map(PricePointDB::from).collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut total = 0;
                for chunk in rows.chunks(UPSERT_CHUNK) {
                    total += diesel::replace_into(pp::price_points)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                }
                debug!("Upserted {} price rows", total);
                Ok(total)
            })
            .await
    }

    async fn delete_before(&self, day: Day) -> Result<usize> {
        let cutoff = format_day(day);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let count = diesel::delete(pp::price_points.filter(pp::day.lt(cutoff)))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(count)
            })
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn get_point(&self, ticker: &Ticker, day: Day, interval: Interval) -> Result<Option<PricePoint>> {
        self.first(Self::series(ticker, interval).filter(pp::day.eq(format_day(day))))
    }

    fn range(
        &self,
        ticker: &Ticker,
        start: Day,
        end: Day,
        interval: Interval,
    ) -> Result<Vec<PricePoint>> {
        let mut conn = get_connection(&self.pool)?;

        Self::series(ticker, interval)
            .filter(pp::day.ge(format_day(start)))
            .filter(pp::day.le(format_day(end)))
            .order(pp::timestamp.asc())
            .load::<PricePointDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(PricePoint::try_from)
            .collect()
    }

    fn latest(&self, ticker: &Ticker, interval: Interval) -> Result<Option<PricePoint>> {
        self.first(Self::series(ticker, interval))
    }

    fn latest_on_or_before(
        &self,
        ticker: &Ticker,
        day: Day,
        interval: Interval,
    ) -> Result<Option<PricePoint>> {
        self.first(Self::series(ticker, interval).filter(pp::day.le(format_day(day))))
    }
}
