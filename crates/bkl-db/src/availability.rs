//! Blocked-date queries: the calendar set behind availability checks and
//! order approval.
//!
//! Two insert flavors exist on purpose. [`block_range`] is the idempotent
//! public blackout operation; re-blocking an already-blocked date is a
//! no-op. [`block_range_strict`] is for the approval transaction, where a
//! concurrent writer that got there first must surface as a conflict and
//! roll the whole approval back.

use bkl_orders::{DateSpan, Result};
use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

/// True iff no date in the inclusive span is blocked for the listing.
pub async fn is_range_available(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
    span: &DateSpan,
) -> Result<bool> {
    let available: bool = sqlx::query_scalar(
        r#"
        select not exists (
            select 1
            from blocked_dates
            where listing_id = $1
              and day between $2 and $3
        )
        "#,
    )
    .bind(listing_id)
    .bind(span.start())
    .bind(span.end())
    .fetch_one(exec)
    .await?;

    Ok(available)
}

/// Idempotently add every date in the inclusive span to the listing's
/// blocked set. Returns how many dates were newly blocked; dates already
/// present are left untouched.
pub async fn block_range(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
    span: &DateSpan,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        insert into blocked_dates (listing_id, day)
        select $1, d::date
        from generate_series($2::date, $3::date, interval '1 day') as g(d)
        on conflict (listing_id, day) do nothing
        "#,
    )
    .bind(listing_id)
    .bind(span.start())
    .bind(span.end())
    .execute(exec)
    .await?;

    Ok(res.rows_affected())
}

/// Add every date in the span, failing on any collision. A date blocked by
/// a concurrent writer raises the unique constraint and comes back as a
/// conflict error; the caller's transaction rolls back whole.
pub async fn block_range_strict(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
    span: &DateSpan,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into blocked_dates (listing_id, day)
        select $1, d::date
        from generate_series($2::date, $3::date, interval '1 day') as g(d)
        "#,
    )
    .bind(listing_id)
    .bind(span.start())
    .bind(span.end())
    .execute(exec)
    .await?;

    Ok(())
}

/// Every blocked date for a listing, ascending.
pub async fn blocked_days(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
) -> Result<Vec<NaiveDate>> {
    let days = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        select day
        from blocked_dates
        where listing_id = $1
        order by day
        "#,
    )
    .bind(listing_id)
    .fetch_all(exec)
    .await?;

    Ok(days)
}
