//! Order lifecycle rules: the transition table and the authorization
//! guards in front of it.
//!
//! ```text
//!               respond(Approve)
//!    Pending ─────────────────────► Approved   (terminal)
//!       │       respond(Deny)
//!       ├─────────────────────────► Denied     (terminal)
//!       │       cancel (staff)
//!       └─────────────────────────► Cancelled  (terminal)
//! ```
//!
//! Every terminal state rejects further transitions. The persistence layer
//! re-checks these rules under a row lock before any status write; this
//! module is the single source of truth for what is legal.

use bkl_schemas::{Actor, LenderResponse, OrderStatus};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Next status for a lender response. Only a pending order accepts one.
pub fn respond(current: OrderStatus, response: LenderResponse) -> Result<OrderStatus> {
    match current {
        OrderStatus::Pending => Ok(response.resulting_status()),
        terminal => Err(Error::validation(format!(
            "order is already {}; no further response is allowed",
            terminal.as_str()
        ))),
    }
}

/// Staff force-cancel. Legal only while the order is still pending: once
/// approved the calendar is committed, and a terminal order has nothing to
/// cancel.
pub fn cancel(current: OrderStatus) -> Result<OrderStatus> {
    match current {
        OrderStatus::Pending => Ok(OrderStatus::Cancelled),
        OrderStatus::Approved => Err(Error::validation(
            "approved orders cannot be cancelled; their dates are committed",
        )),
        terminal => Err(Error::validation(format!(
            "order is already {}",
            terminal.as_str()
        ))),
    }
}

/// Hard deletion is refused once an approval has committed calendar dates.
pub fn ensure_deletable(current: OrderStatus) -> Result<()> {
    if current == OrderStatus::Approved {
        return Err(Error::validation(
            "approved orders cannot be deleted; their dates are committed",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Authorization guards
// ---------------------------------------------------------------------------

/// A renter may not order their own listing.
pub fn ensure_not_self_order(renter: Uuid, listing_owner: Uuid) -> Result<()> {
    if renter == listing_owner {
        return Err(Error::validation(
            "self-order not allowed: renter owns this listing",
        ));
    }
    Ok(())
}

/// Only the order's lender or staff may respond.
pub fn ensure_may_respond(actor: &Actor, lender_id: Uuid) -> Result<()> {
    if actor.is_staff || actor.user_id == lender_id {
        return Ok(());
    }
    Err(Error::permission(
        "only the lender or staff may respond to this order",
    ))
}

/// Renters and lenders never hard-delete or force-cancel; those are staff
/// operations (cancellation for a renter is a status change they request
/// out of band, not an API path).
pub fn ensure_staff(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_staff {
        return Ok(());
    }
    Err(Error::permission(format!("only staff may {action}")))
}

/// An order is visible to its renter, its lender, and staff.
pub fn ensure_may_view(actor: &Actor, renter_id: Uuid, lender_id: Uuid) -> Result<()> {
    if actor.is_staff || actor.user_id == renter_id || actor.user_id == lender_id {
        return Ok(());
    }
    Err(Error::permission("not a participant in this order"))
}

/// Manual calendar blackouts are for the listing's owner and staff.
pub fn ensure_may_block_dates(actor: &Actor, listing_owner: Uuid) -> Result<()> {
    if actor.is_staff || actor.user_id == listing_owner {
        return Ok(());
    }
    Err(Error::permission(
        "only the listing owner or staff may block dates",
    ))
}

/// Listing edits are for the listing's owner and staff. Ownership itself
/// is immutable; a listing never changes hands.
pub fn ensure_may_edit_listing(actor: &Actor, listing_owner: Uuid) -> Result<()> {
    if actor.is_staff || actor.user_id == listing_owner {
        return Ok(());
    }
    Err(Error::permission(
        "only the listing owner or staff may edit this listing",
    ))
}
