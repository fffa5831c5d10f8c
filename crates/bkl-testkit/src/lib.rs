//! Shared fixtures for DB-backed scenario tests.
//!
//! Every helper seeds rows with uuid-suffixed natural keys, so suites can
//! run repeatedly against the same development database without cleanup
//! between runs. Calendar fixtures isolate by listing id, not by date.

use anyhow::Result;
use bkl_schemas::{Actor, LenderResponse};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

/// Connect and migrate, or `None` when `BKL_DATABASE_URL` is unset.
/// Callers print a `SKIP:` line and return early on `None`.
pub async fn try_pool() -> Result<Option<PgPool>> {
    let url = match std::env::var(bkl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    bkl_db::migrate(&pool).await?;

    Ok(Some(pool))
}

/// Parse a `YYYY-MM-DD` fixture literal. Panics on a typo; fixture dates
/// are hardcoded in the tests themselves.
pub fn day(s: &str) -> NaiveDate {
    s.parse().expect("malformed fixture date literal")
}

pub fn actor_for(user: &bkl_db::UserRow) -> Actor {
    Actor {
        user_id: user.user_id,
        is_staff: user.is_staff,
        is_lender: user.is_lender,
    }
}

/// Insert a user with a unique `{prefix}_{uuid}` username.
pub async fn seed_user(
    pool: &PgPool,
    prefix: &str,
    is_staff: bool,
    is_lender: bool,
) -> Result<bkl_db::UserRow> {
    let row = bkl_db::insert_user(
        pool,
        &bkl_db::NewUser {
            user_id: Uuid::new_v4(),
            username: format!("{prefix}_{}", Uuid::new_v4().simple()),
            display_name: prefix.to_string(),
            is_staff,
            is_lender,
        },
    )
    .await?;
    Ok(row)
}

/// Insert a listing owned by `owner` at the given daily price.
pub async fn seed_listing(
    pool: &PgPool,
    owner: &bkl_db::UserRow,
    price_cents: i64,
) -> Result<bkl_db::ListingRow> {
    let row = bkl_db::insert_listing(
        pool,
        &bkl_db::NewListing {
            listing_id: Uuid::new_v4(),
            owner_id: owner.user_id,
            title: format!("Test item {}", Uuid::new_v4().simple()),
            price_cents,
            tags: vec!["test".to_string()],
        },
    )
    .await?;
    Ok(row)
}

/// Create a PENDING order as `renter` over the inclusive date range.
pub async fn seed_pending_order(
    pool: &PgPool,
    renter: &bkl_db::UserRow,
    listing_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bkl_db::orders::OrderRow> {
    let row = bkl_db::orders::create_order(
        pool,
        &actor_for(renter),
        &bkl_db::orders::NewOrder {
            listing_id,
            requested_date: chrono::Utc::now().date_naive(),
            start_date: start,
            end_date: end,
        },
    )
    .await?;
    Ok(row)
}

/// Create an order and approve it as `lender` (who must own the listing),
/// committing its dates to the calendar.
pub async fn seed_approved_order(
    pool: &PgPool,
    renter: &bkl_db::UserRow,
    lender: &bkl_db::UserRow,
    listing_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bkl_db::orders::OrderRow> {
    let pending = seed_pending_order(pool, renter, listing_id, start, end).await?;
    let approved = bkl_db::orders::respond_to_order(
        pool,
        &actor_for(lender),
        pending.order_id,
        LenderResponse::Approve,
    )
    .await?;
    Ok(approved)
}
