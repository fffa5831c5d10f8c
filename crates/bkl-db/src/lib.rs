//! Postgres persistence for the backline marketplace.
//!
//! Bootstrap functions (connect/migrate/status) return `anyhow::Result`
//! since they only run on operator paths; entity operations return the
//! typed [`bkl_orders::Error`] so the HTTP layer can map refusals to
//! status codes.

use anyhow::Context;
use bkl_orders::{lifecycle, Error, Result};
use bkl_schemas::Actor;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub mod availability;
pub mod orders;
pub mod reviews;
pub mod saved;

pub const ENV_DB_URL: &str = "BKL_DATABASE_URL";

/// Connect to Postgres using BKL_DATABASE_URL.
pub async fn connect_from_env() -> anyhow::Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> anyhow::Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Count orders still awaiting a lender response. Used by the CLI migrate
/// guardrail: migrating under open business is refused without --yes.
pub async fn count_pending_orders(pool: &PgPool) -> anyhow::Result<i64> {
    // If the schema doesn't exist yet, treat as 0 (safe) rather than failing.
    let st = status(pool).await?;
    if !st.has_orders_table {
        return Ok(0);
    }

    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from orders
        where status = 'PENDING'
        "#,
    )
    .fetch_one(pool)
    .await
    .context("count_pending_orders failed")?;

    Ok(n)
}

/// Convenience boolean.
pub async fn has_pending_orders(pool: &PgPool) -> anyhow::Result<bool> {
    Ok(count_pending_orders(pool).await? > 0)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_lender: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_lender: bool,
}

/// Insert a user. A taken username surfaces as a conflict via the unique
/// constraint, not as a pre-check.
pub async fn insert_user(pool: &PgPool, user: &NewUser) -> Result<UserRow> {
    if user.username.trim().is_empty() {
        return Err(Error::validation("username must not be empty"));
    }

    let row = sqlx::query_as::<_, UserRow>(
        r#"
        insert into users (user_id, username, display_name, is_staff, is_lender)
        values ($1, $2, $3, $4, $5)
        returning user_id, username, display_name, is_staff, is_lender, created_at
        "#,
    )
    .bind(user.user_id)
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(user.is_staff)
    .bind(user.is_lender)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn fetch_user(exec: impl PgExecutor<'_>, user_id: Uuid) -> Result<UserRow> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        select user_id, username, display_name, is_staff, is_lender, created_at
        from users
        where user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(exec)
    .await?
    .ok_or(Error::NotFound("user", user_id))?;

    Ok(row)
}

pub async fn fetch_user_by_username(
    exec: impl PgExecutor<'_>,
    username: &str,
) -> Result<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        select user_id, username, display_name, is_staff, is_lender, created_at
        from users
        where username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(exec)
    .await?;

    Ok(row)
}

/// Load the capability flags for an authenticated user id. The identity
/// boundary supplies the id; everything the core trusts about the caller
/// comes from this row.
pub async fn load_actor(exec: impl PgExecutor<'_>, user_id: Uuid) -> Result<Actor> {
    let user = fetch_user(exec, user_id).await?;
    Ok(Actor {
        user_id: user.user_id,
        is_staff: user.is_staff,
        is_lender: user.is_lender,
    })
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub listing_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub listing_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub tags: Vec<String>,
}

pub async fn insert_listing(pool: &PgPool, listing: &NewListing) -> Result<ListingRow> {
    if listing.title.trim().is_empty() {
        return Err(Error::validation("listing title must not be empty"));
    }
    if listing.price_cents < 0 {
        return Err(Error::validation(format!(
            "price per day must be non-negative, got {}",
            listing.price_cents
        )));
    }
    // Resolve the owner first so a bad reference is a not-found, not a
    // foreign-key failure.
    fetch_user(pool, listing.owner_id).await?;

    let row = sqlx::query_as::<_, ListingRow>(
        r#"
        insert into listings (listing_id, owner_id, title, price_cents, tags)
        values ($1, $2, $3, $4, $5)
        returning listing_id, owner_id, title, price_cents, tags, created_at, updated_at
        "#,
    )
    .bind(listing.listing_id)
    .bind(listing.owner_id)
    .bind(&listing.title)
    .bind(listing.price_cents)
    .bind(&listing.tags)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Partial update for a listing. Absent fields keep their stored value;
/// the owner is never patchable.
#[derive(Debug, Clone, Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub price_cents: Option<i64>,
    pub tags: Option<Vec<String>>,
}

/// Patch a listing's renter-facing fields. Owner or staff only. Every
/// patch touches `updated_at`, an empty one included.
pub async fn update_listing(
    pool: &PgPool,
    actor: &Actor,
    listing_id: Uuid,
    patch: &ListingPatch,
) -> Result<ListingRow> {
    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            return Err(Error::validation("listing title must not be empty"));
        }
    }
    if let Some(price) = patch.price_cents {
        if price < 0 {
            return Err(Error::validation(format!(
                "price per day must be non-negative, got {price}"
            )));
        }
    }

    let current = fetch_listing(pool, listing_id).await?;
    lifecycle::ensure_may_edit_listing(actor, current.owner_id)?;

    let row = sqlx::query_as::<_, ListingRow>(
        r#"
        update listings
        set title       = coalesce($2, title),
            price_cents = coalesce($3, price_cents),
            tags        = coalesce($4, tags),
            updated_at  = now()
        where listing_id = $1
        returning listing_id, owner_id, title, price_cents, tags, created_at, updated_at
        "#,
    )
    .bind(listing_id)
    .bind(&patch.title)
    .bind(patch.price_cents)
    .bind(&patch.tags)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn fetch_listing(exec: impl PgExecutor<'_>, listing_id: Uuid) -> Result<ListingRow> {
    let row = sqlx::query_as::<_, ListingRow>(
        r#"
        select listing_id, owner_id, title, price_cents, tags, created_at, updated_at
        from listings
        where listing_id = $1
        "#,
    )
    .bind(listing_id)
    .fetch_optional(exec)
    .await?
    .ok_or(Error::NotFound("listing", listing_id))?;

    Ok(row)
}

/// All listings, newest first, optionally narrowed to one tag.
pub async fn list_listings(
    exec: impl PgExecutor<'_>,
    tag: Option<&str>,
) -> Result<Vec<ListingRow>> {
    let rows = sqlx::query_as::<_, ListingRow>(
        r#"
        select listing_id, owner_id, title, price_cents, tags, created_at, updated_at
        from listings
        where $1::text is null or $1 = any (tags)
        order by created_at desc, listing_id
        "#,
    )
    .bind(tag)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}
