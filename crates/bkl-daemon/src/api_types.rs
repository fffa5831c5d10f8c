//! Request and response types for all bkl-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here; conversion
//! from storage rows is mechanical.

use bkl_db::orders::OrderRow;
use bkl_db::reviews::{ListingReviewRow, UserReviewRow};
use bkl_db::saved::SavedRow;
use bkl_db::{ListingRow, UserRow};
use bkl_schemas::{LenderResponse, OrderStatus, ReviewStats};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub db_ok: bool,
    pub has_orders_table: bool,
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// Structured refusal body: `{"error": {"kind": "...", "message": "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Registration payload. Staff can only be minted through the CLI; this
/// surface never grants flags beyond `is_lender`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    /// Defaults to the username when omitted or blank.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_lender: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_lender: bool,
    pub created_at: DateTime<Utc>,
}

impl UserPayload {
    pub fn from_row(row: &UserRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username.clone(),
            display_name: row.display_name.clone(),
            is_staff: row.is_staff,
            is_lender: row.is_lender,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub price_cents: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPayload {
    pub listing_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingPayload {
    pub fn from_row(row: &ListingRow) -> Self {
        Self {
            listing_id: row.listing_id,
            owner_id: row.owner_id,
            title: row.title.clone(),
            price_cents: row.price_cents,
            tags: row.tags.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Patch shape for a listing. Absent fields keep their stored value; the
/// owner is not part of the shape at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingsResponse {
    pub listings: Vec<ListingPayload>,
}

/// Detail view: the listing plus everything a renter needs to decide,
/// namely derived review stats and the current blocked calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetailResponse {
    pub listing: ListingPayload,
    pub review_stats: ReviewStats,
    pub blocked_days: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub listing_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDatesRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ---------------------------------------------------------------------------
// Saved listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveListingRequest {
    pub listing_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPayload {
    pub saved_id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl SavedPayload {
    pub fn from_row(row: &SavedRow) -> Self {
        Self {
            saved_id: row.saved_id,
            user_id: row.user_id,
            listing_id: row.listing_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedResponse {
    pub saved: Vec<SavedPayload>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub listing_id: Uuid,
    /// When omitted the daemon stamps today (UTC).
    pub requested_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Lender response to a pending order. `status`, when supplied, must agree
/// with `response`; it exists so clients that PATCH the full order shape
/// are told about a mismatch instead of having half their intent ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondOrderRequest {
    pub response: LenderResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
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

impl OrderPayload {
    pub fn from_row(row: &OrderRow) -> Self {
        Self {
            order_id: row.order_id,
            renter_id: row.renter_id,
            lender_id: row.lender_id,
            listing_id: row.listing_id,
            requested_date: row.requested_date,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            lender_response: row.lender_response,
            subtotal_cents: row.subtotal_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersQuery {
    /// "renter" (default) or "lender".
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderPayload>,
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingReviewRequest {
    pub listing_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingReviewPayload {
    pub review_id: Uuid,
    pub listing_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ListingReviewPayload {
    pub fn from_row(row: &ListingReviewRow) -> Self {
        Self {
            review_id: row.review_id,
            listing_id: row.listing_id,
            reviewer_id: row.reviewer_id,
            rating: row.rating,
            body: row.body.clone(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserReviewRequest {
    pub renter_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewPayload {
    pub review_id: Uuid,
    pub lender_id: Uuid,
    pub renter_id: Uuid,
    pub rating: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl UserReviewPayload {
    pub fn from_row(row: &UserReviewRow) -> Self {
        Self {
            review_id: row.review_id,
            lender_id: row.lender_id,
            renter_id: row.renter_id,
            rating: row.rating,
            body: row.body.clone(),
            created_at: row.created_at,
        }
    }
}
