//! Review creation behind the completed-rental gates.
//!
//! A review requires a prior *approved* order between the two parties.
//! The gate refusal is a validation error; a duplicate review for the
//! same pair is a distinct conflict raised by the unique constraint, and
//! the two are never merged.

use bkl_orders::{Error, Result};
use bkl_schemas::{Actor, ReviewStats};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingReviewRow {
    pub review_id: Uuid,
    pub listing_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserReviewRow {
    pub review_id: Uuid,
    pub lender_id: Uuid,
    pub renter_id: Uuid,
    pub rating: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

fn ensure_rating(rating: i32) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(Error::validation(format!(
            "rating must be between 1 and 5, got {rating}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// True iff `user_id` rented `listing_id` through an approved order and is
/// not the listing's owner.
pub async fn can_review_listing(
    exec: impl PgExecutor<'_>,
    user_id: Uuid,
    listing_id: Uuid,
) -> Result<bool> {
    let allowed: bool = sqlx::query_scalar(
        r#"
        select exists (
            select 1
            from orders o
            join listings l on l.listing_id = o.listing_id
            where o.renter_id = $1
              and o.listing_id = $2
              and o.status = 'APPROVED'
              and l.owner_id <> $1
        )
        "#,
    )
    .bind(user_id)
    .bind(listing_id)
    .fetch_one(exec)
    .await?;

    Ok(allowed)
}

/// True iff an approved order exists with exactly this (lender, renter)
/// pair, the two are distinct, and the lender actually has the lender flag.
pub async fn can_review_user(
    exec: impl PgExecutor<'_>,
    lender_id: Uuid,
    renter_id: Uuid,
) -> Result<bool> {
    let allowed: bool = sqlx::query_scalar(
        r#"
        select exists (
            select 1
            from orders o
            join users u on u.user_id = $1
            where o.lender_id = $1
              and o.renter_id = $2
              and o.status = 'APPROVED'
              and u.is_lender
              and $1 <> $2
        )
        "#,
    )
    .bind(lender_id)
    .bind(renter_id)
    .fetch_one(exec)
    .await?;

    Ok(allowed)
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Create a listing review as the acting renter. A missing listing is a
/// validation error here, per the review contract, rather than a 404.
pub async fn create_listing_review(
    pool: &PgPool,
    reviewer: &Actor,
    listing_id: Uuid,
    rating: i32,
    body: &str,
) -> Result<ListingReviewRow> {
    ensure_rating(rating)?;

    let mut tx = pool.begin().await?;

    match crate::fetch_listing(&mut *tx, listing_id).await {
        Ok(_) => {}
        Err(Error::NotFound(..)) => {
            return Err(Error::validation(format!("listing {listing_id} not found")))
        }
        Err(e) => return Err(e),
    }
    if !can_review_listing(&mut *tx, reviewer.user_id, listing_id).await? {
        return Err(Error::validation(
            "no approved order for this listing; review not allowed",
        ));
    }

    let row = sqlx::query_as::<_, ListingReviewRow>(
        r#"
        insert into listing_reviews (review_id, listing_id, reviewer_id, rating, body)
        values ($1, $2, $3, $4, $5)
        returning review_id, listing_id, reviewer_id, rating, body, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(listing_id)
    .bind(reviewer.user_id)
    .bind(rating)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Create a review of a renter as the acting lender.
pub async fn create_user_review(
    pool: &PgPool,
    lender: &Actor,
    renter_id: Uuid,
    rating: i32,
    body: &str,
) -> Result<UserReviewRow> {
    ensure_rating(rating)?;

    let mut tx = pool.begin().await?;

    match crate::fetch_user(&mut *tx, renter_id).await {
        Ok(_) => {}
        Err(Error::NotFound(..)) => {
            return Err(Error::validation(format!("user {renter_id} not found")))
        }
        Err(e) => return Err(e),
    }
    if !can_review_user(&mut *tx, lender.user_id, renter_id).await? {
        return Err(Error::validation(
            "no approved order with this renter; review not allowed",
        ));
    }

    let row = sqlx::query_as::<_, UserReviewRow>(
        r#"
        insert into user_reviews (review_id, lender_id, renter_id, rating, body)
        values ($1, $2, $3, $4, $5)
        returning review_id, lender_id, renter_id, rating, body, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(lender.user_id)
    .bind(renter_id)
    .bind(rating)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Derived listing stats: review count and average rating, computed from
/// integer totals so no float enters the data path.
pub async fn listing_review_stats(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
) -> Result<ReviewStats> {
    let (count, sum): (i64, i64) = sqlx::query_as(
        r#"
        select count(rating)::bigint, coalesce(sum(rating), 0)::bigint
        from listing_reviews
        where listing_id = $1
        "#,
    )
    .bind(listing_id)
    .fetch_one(exec)
    .await?;

    Ok(ReviewStats::from_totals(count, sum))
}

/// Reviews for a listing, newest first.
pub async fn list_listing_reviews(
    exec: impl PgExecutor<'_>,
    listing_id: Uuid,
) -> Result<Vec<ListingReviewRow>> {
    let rows = sqlx::query_as::<_, ListingReviewRow>(
        r#"
        select review_id, listing_id, reviewer_id, rating, body, created_at
        from listing_reviews
        where listing_id = $1
        order by created_at desc, review_id
        "#,
    )
    .bind(listing_id)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}
