//! Order persistence and the transactional lifecycle operations.
//!
//! Every mutating operation here owns exactly one transaction: the guard
//! checks, the status write and any calendar side effect commit together
//! or roll back together. `respond_to_order` additionally locks the order
//! row (`for update`) before inspecting its status, so two racing
//! responses serialize instead of both passing the pending check.

use bkl_orders::{lifecycle, pricing, DateSpan, Error, Result};
use bkl_schemas::{Actor, LenderResponse, OrderStatus};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::availability;

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_id: Uuid,
    pub renter_id: Uuid,
    pub lender_id: Uuid,
    pub listing_id: Uuid,
    pub requested_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: OrderStatus,
    pub lender_response: Option<LenderResponse>,
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub listing_id: Uuid,
    pub requested_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn map_order_row(row: &PgRow) -> Result<OrderRow> {
    let status = OrderStatus::parse(&row.try_get::<String, _>("status")?)?;
    let lender_response = match row.try_get::<Option<String>, _>("lender_response")? {
        Some(s) => Some(LenderResponse::parse(&s)?),
        None => None,
    };

    Ok(OrderRow {
        order_id: row.try_get("order_id")?,
        renter_id: row.try_get("renter_id")?,
        lender_id: row.try_get("lender_id")?,
        listing_id: row.try_get("listing_id")?,
        requested_date: row.try_get("requested_date")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status,
        lender_response,
        subtotal_cents: row.try_get("subtotal_cents")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ---------------------------------------------------------------------------
// Lifecycle operations
// ---------------------------------------------------------------------------

/// Create a rental order in `Pending`.
///
/// The self-order check, the availability check and the insert run in one
/// transaction. Overlapping pending orders are allowed to coexist;
/// approval is the point where dates are committed and the loser of a
/// race is refused.
pub async fn create_order(pool: &PgPool, renter: &Actor, new: &NewOrder) -> Result<OrderRow> {
    let span = DateSpan::new(new.start_date, new.end_date)?;

    let mut tx = pool.begin().await?;

    let listing = crate::fetch_listing(&mut *tx, new.listing_id).await?;
    lifecycle::ensure_not_self_order(renter.user_id, listing.owner_id)?;

    if !availability::is_range_available(&mut *tx, listing.listing_id, &span).await? {
        return Err(Error::validation(format!(
            "dates unavailable for listing {}: {span} overlaps blocked dates",
            listing.listing_id
        )));
    }

    let subtotal_cents = pricing::order_subtotal_cents(listing.price_cents, &span)?;

    let row = sqlx::query(
        r#"
        insert into orders (
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, subtotal_cents
        ) values ($1, $2, $3, $4, $5, $6, $7, $8)
        returning
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(renter.user_id)
    .bind(listing.owner_id)
    .bind(listing.listing_id)
    .bind(new.requested_date)
    .bind(span.start())
    .bind(span.end())
    .bind(subtotal_cents)
    .fetch_one(&mut *tx)
    .await?;
    let order = map_order_row(&row)?;

    tx.commit().await?;
    Ok(order)
}

pub async fn fetch_order(exec: impl PgExecutor<'_>, order_id: Uuid) -> Result<OrderRow> {
    let row = sqlx::query(
        r#"
        select
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        from orders
        where order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(exec)
    .await?
    .ok_or(Error::NotFound("order", order_id))?;

    map_order_row(&row)
}

async fn fetch_order_locked(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<OrderRow> {
    let row = sqlx::query(
        r#"
        select
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        from orders
        where order_id = $1
        for update
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(Error::NotFound("order", order_id))?;

    map_order_row(&row)
}

/// Apply the lender's response to a pending order.
///
/// Approval blocks every date of the order in the same transaction as the
/// status write. If one of them was blocked since the order was created,
/// the re-check refuses with a validation error; if a concurrent writer
/// sneaks in after the re-check, the strict insert hits the unique
/// constraint and the whole approval rolls back as a conflict.
pub async fn respond_to_order(
    pool: &PgPool,
    actor: &Actor,
    order_id: Uuid,
    response: LenderResponse,
) -> Result<OrderRow> {
    let mut tx = pool.begin().await?;

    let order = fetch_order_locked(&mut tx, order_id).await?;
    lifecycle::ensure_may_respond(actor, order.lender_id)?;
    let next = lifecycle::respond(order.status, response)?;

    if next == OrderStatus::Approved {
        let span = DateSpan::new(order.start_date, order.end_date)?;
        if !availability::is_range_available(&mut *tx, order.listing_id, &span).await? {
            return Err(Error::validation(format!(
                "cannot approve order {order_id}: dates {span} are no longer available"
            )));
        }
        availability::block_range_strict(&mut *tx, order.listing_id, &span).await?;
    }

    let row = sqlx::query(
        r#"
        update orders
        set status = $2,
            lender_response = $3,
            updated_at = now()
        where order_id = $1
        returning
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        "#,
    )
    .bind(order_id)
    .bind(next.as_str())
    .bind(response.as_str())
    .fetch_one(&mut *tx)
    .await?;
    let updated = map_order_row(&row)?;

    tx.commit().await?;
    Ok(updated)
}

/// Staff force-cancel of a pending order. No calendar mutation: nothing
/// was blocked for a pending order.
pub async fn cancel_order(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<OrderRow> {
    lifecycle::ensure_staff(actor, "cancel orders")?;

    let mut tx = pool.begin().await?;

    let order = fetch_order_locked(&mut tx, order_id).await?;
    let next = lifecycle::cancel(order.status)?;

    let row = sqlx::query(
        r#"
        update orders
        set status = $2,
            updated_at = now()
        where order_id = $1
        returning
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        "#,
    )
    .bind(order_id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;
    let updated = map_order_row(&row)?;

    tx.commit().await?;
    Ok(updated)
}

/// Staff-only hard delete. Refused once approval has committed calendar
/// dates; cancellation is a status, not a deletion.
pub async fn delete_order(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<()> {
    lifecycle::ensure_staff(actor, "delete orders")?;

    let mut tx = pool.begin().await?;

    let order = fetch_order_locked(&mut tx, order_id).await?;
    lifecycle::ensure_deletable(order.status)?;

    sqlx::query("delete from orders where order_id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Listings of orders
// ---------------------------------------------------------------------------

/// Orders placed by a renter, newest first.
pub async fn list_orders_for_renter(
    exec: impl PgExecutor<'_>,
    renter_id: Uuid,
) -> Result<Vec<OrderRow>> {
    let rows = sqlx::query(
        r#"
        select
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        from orders
        where renter_id = $1
        order by created_at desc, order_id
        "#,
    )
    .bind(renter_id)
    .fetch_all(exec)
    .await?;

    rows.iter().map(map_order_row).collect()
}

/// Incoming requests for a lender, newest first.
pub async fn list_orders_for_lender(
    exec: impl PgExecutor<'_>,
    lender_id: Uuid,
) -> Result<Vec<OrderRow>> {
    let rows = sqlx::query(
        r#"
        select
          order_id, renter_id, lender_id, listing_id, requested_date,
          start_date, end_date, status, lender_response, subtotal_cents,
          created_at, updated_at
        from orders
        where lender_id = $1
        order by created_at desc, order_id
        "#,
    )
    .bind(lender_id)
    .fetch_all(exec)
    .await?;

    rows.iter().map(map_order_row).collect()
}
