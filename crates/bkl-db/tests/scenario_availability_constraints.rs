//! Scenario: calendar blocking semantics and the (listing_id, day) backstop.
//!
//! The manual blackout path absorbs duplicates; the approval path must
//! fail loudly on a collision and roll back whole. Both behaviors ride on
//! the same UNIQUE constraint.
//!
//! DB-backed tests. Each skips if BKL_DATABASE_URL is not set.

use bkl_orders::DateSpan;
use chrono::NaiveDate;
use uuid::Uuid;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Returns true if `err` is a PostgreSQL CHECK constraint violation (SQLSTATE 23514).
fn is_check_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        db_err.code().as_deref() == Some("23514")
    } else {
        false
    }
}

async fn seed_listing(pool: &sqlx::PgPool) -> anyhow::Result<bkl_db::ListingRow> {
    let owner = bkl_db::insert_user(
        pool,
        &bkl_db::NewUser {
            user_id: Uuid::new_v4(),
            username: format!("owner_{}", Uuid::new_v4().simple()),
            display_name: "owner".to_string(),
            is_staff: false,
            is_lender: true,
        },
    )
    .await?;
    let listing = bkl_db::insert_listing(
        pool,
        &bkl_db::NewListing {
            listing_id: Uuid::new_v4(),
            owner_id: owner.user_id,
            title: "Calendar test item".to_string(),
            price_cents: 1_000,
            tags: vec![],
        },
    )
    .await?;
    Ok(listing)
}

#[tokio::test]
async fn block_range_is_idempotent_and_availability_tells_the_truth() -> anyhow::Result<()> {
    let url = match std::env::var(bkl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    bkl_db::migrate(&pool).await?;

    let listing = seed_listing(&pool).await?;
    let span = DateSpan::new(d("2099-05-10"), d("2099-05-12"))?;

    let inserted = bkl_db::availability::block_range(&pool, listing.listing_id, &span).await?;
    assert_eq!(inserted, 3, "three inclusive days blocked");

    // Same range again: absorbed, nothing new.
    let again = bkl_db::availability::block_range(&pool, listing.listing_id, &span).await?;
    assert_eq!(again, 0, "second call must not add rows");

    let days = bkl_db::availability::blocked_days(&pool, listing.listing_id).await?;
    assert_eq!(
        days,
        vec![d("2099-05-10"), d("2099-05-11"), d("2099-05-12")],
        "blocked set is exactly the span, ordered"
    );

    // Any range touching a blocked day is unavailable; edges are inclusive.
    for (start, end) in [
        ("2099-05-09", "2099-05-10"),
        ("2099-05-12", "2099-05-14"),
        ("2099-05-11", "2099-05-11"),
        ("2099-05-01", "2099-05-31"),
    ] {
        let span = DateSpan::new(d(start), d(end))?;
        assert!(
            !bkl_db::availability::is_range_available(&pool, listing.listing_id, &span).await?,
            "{span} overlaps the blocked span"
        );
    }

    // Ranges that miss the blocked set entirely are available.
    for (start, end) in [("2099-05-08", "2099-05-09"), ("2099-05-13", "2099-05-14")] {
        let span = DateSpan::new(d(start), d(end))?;
        assert!(
            bkl_db::availability::is_range_available(&pool, listing.listing_id, &span).await?,
            "{span} is clear of the blocked span"
        );
    }

    // A partially overlapping block only inserts the new days.
    let widened = DateSpan::new(d("2099-05-12"), d("2099-05-13"))?;
    let added = bkl_db::availability::block_range(&pool, listing.listing_id, &widened).await?;
    assert_eq!(added, 1, "only 05-13 is new");

    Ok(())
}

#[tokio::test]
async fn strict_blocking_collides_and_rolls_back_whole() -> anyhow::Result<()> {
    let url = match std::env::var(bkl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    bkl_db::migrate(&pool).await?;

    let listing = seed_listing(&pool).await?;
    let committed = DateSpan::new(d("2099-06-01"), d("2099-06-02"))?;
    bkl_db::availability::block_range(&pool, listing.listing_id, &committed).await?;

    // Overlap by one day inside a transaction: the unique constraint fires
    // and the whole strict insert is discarded.
    let mut tx = pool.begin().await?;
    let overlap = DateSpan::new(d("2099-06-02"), d("2099-06-03"))?;
    let err = bkl_db::availability::block_range_strict(&mut *tx, listing.listing_id, &overlap)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert!(
        err.to_string().contains("already blocked"),
        "constraint should be translated to a named conflict; got: {err}"
    );
    tx.rollback().await?;

    // The non-colliding day of the failed span must not have leaked.
    let leftover = DateSpan::new(d("2099-06-03"), d("2099-06-03"))?;
    assert!(
        bkl_db::availability::is_range_available(&pool, listing.listing_id, &leftover).await?,
        "failed strict block must leave no partial rows"
    );

    Ok(())
}

#[tokio::test]
async fn check_constraints_reject_invalid_rows() -> anyhow::Result<()> {
    let url = match std::env::var(bkl_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BKL_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;
    bkl_db::migrate(&pool).await?;

    let listing = seed_listing(&pool).await?;
    let renter = bkl_db::insert_user(
        &pool,
        &bkl_db::NewUser {
            user_id: Uuid::new_v4(),
            username: format!("renter_{}", Uuid::new_v4().simple()),
            display_name: "renter".to_string(),
            is_staff: false,
            is_lender: false,
        },
    )
    .await?;

    // orders.status outside the allowed set.
    let err = sqlx::query(
        r#"
        insert into orders (
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, subtotal_cents
        ) values ($1, $2, $3, $4, '2099-01-01', '2099-01-01', '2099-01-02', 'NOT_A_STATUS', 100)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(renter.user_id)
    .bind(listing.owner_id)
    .bind(listing.listing_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(
        is_check_violation(&err),
        "orders.status: 'NOT_A_STATUS' must fail with CHECK violation (23514); got: {err}"
    );

    // Inverted date range.
    let err = sqlx::query(
        r#"
        insert into orders (
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, subtotal_cents
        ) values ($1, $2, $3, $4, '2099-01-01', '2099-01-05', '2099-01-02', 100)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(renter.user_id)
    .bind(listing.owner_id)
    .bind(listing.listing_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(
        is_check_violation(&err),
        "orders: end before start must fail ck_orders_date_order; got: {err}"
    );

    // Renter renting from themselves.
    let err = sqlx::query(
        r#"
        insert into orders (
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, subtotal_cents
        ) values ($1, $2, $2, $3, '2099-01-01', '2099-01-01', '2099-01-02', 100)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(renter.user_id)
    .bind(listing.listing_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(
        is_check_violation(&err),
        "orders: renter == lender must fail ck_orders_not_self; got: {err}"
    );

    // Rating outside 1..=5.
    let err = sqlx::query(
        r#"
        insert into listing_reviews (review_id, listing_id, reviewer_id, rating, body)
        values ($1, $2, $3, 9, 'too good')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(listing.listing_id)
    .bind(renter.user_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(
        is_check_violation(&err),
        "listing_reviews.rating: 9 must fail with CHECK violation (23514); got: {err}"
    );

    // Negative price.
    let err = sqlx::query(
        r#"
        insert into listings (listing_id, owner_id, title, price_cents)
        values ($1, $2, 'freebie', -1)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(listing.owner_id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(
        is_check_violation(&err),
        "listings.price_cents: -1 must fail with CHECK violation (23514); got: {err}"
    );

    Ok(())
}
