//! Saved-listing bookmarks.
//!
//! A bookmark is private to the user who made it: reads and deletes are
//! scoped to the acting user, and no path exposes another user's saves.
//! Saving never touches the calendar; a duplicate save is a conflict
//! raised by the unique (user_id, listing_id) constraint.

use bkl_orders::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedRow {
    pub saved_id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Bookmark a listing for the acting user.
pub async fn save_listing(pool: &PgPool, user_id: Uuid, listing_id: Uuid) -> Result<SavedRow> {
    // Resolve the listing first so a bad reference is a not-found, not a
    // foreign-key failure.
    crate::fetch_listing(pool, listing_id).await?;

    let row = sqlx::query_as::<_, SavedRow>(
        r#"
        insert into saved_listings (saved_id, user_id, listing_id)
        values ($1, $2, $3)
        returning saved_id, user_id, listing_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(listing_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Remove the acting user's bookmark on a listing. Unsaving something
/// never bookmarked is a not-found, not a silent no-op.
pub async fn unsave_listing(
    exec: impl PgExecutor<'_>,
    user_id: Uuid,
    listing_id: Uuid,
) -> Result<()> {
    let res = sqlx::query(
        r#"
        delete from saved_listings
        where user_id = $1 and listing_id = $2
        "#,
    )
    .bind(user_id)
    .bind(listing_id)
    .execute(exec)
    .await?;

    if res.rows_affected() == 0 {
        return Err(Error::NotFound("saved listing", listing_id));
    }
    Ok(())
}

/// The acting user's bookmarks, newest first.
pub async fn list_saved(exec: impl PgExecutor<'_>, user_id: Uuid) -> Result<Vec<SavedRow>> {
    let rows = sqlx::query_as::<_, SavedRow>(
        r#"
        select saved_id, user_id, listing_id, created_at
        from saved_listings
        where user_id = $1
        order by created_at desc, saved_id
        "#,
    )
    .bind(user_id)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}
