//! Shared plain types for the backline marketplace: order status codecs,
//! the caller identity (`Actor`), and derived review statistics.
//!
//! This crate is serde-only; persistence and HTTP shapes live in their
//! own crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a rental order.
///
/// `Pending` is the only non-terminal state; every successor is terminal.
/// Stored and serialized as SCREAMING strings (`PENDING`, `APPROVED`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created by the renter; awaiting the lender's response.
    Pending,
    /// Lender approved; the order's dates are blocked on the listing. **Terminal.**
    Approved,
    /// Lender denied. **Terminal.**
    Denied,
    /// Cancelled by staff while still pending. **Terminal.**
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Denied => "DENIED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseCodeError> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "APPROVED" => Ok(OrderStatus::Approved),
            "DENIED" => Ok(OrderStatus::Denied),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ParseCodeError::new("order status", other)),
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// LenderResponse
// ---------------------------------------------------------------------------

/// The lender's answer to a pending order. Absent (`NULL`) until the lender
/// responds; immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LenderResponse {
    Approve,
    Deny,
}

impl LenderResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            LenderResponse::Approve => "APPROVE",
            LenderResponse::Deny => "DENY",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseCodeError> {
        match s {
            "APPROVE" => Ok(LenderResponse::Approve),
            "DENY" => Ok(LenderResponse::Deny),
            other => Err(ParseCodeError::new("lender response", other)),
        }
    }

    /// The status an order ends up in when this response is applied.
    pub fn resulting_status(&self) -> OrderStatus {
        match self {
            LenderResponse::Approve => OrderStatus::Approved,
            LenderResponse::Deny => OrderStatus::Denied,
        }
    }
}

// ---------------------------------------------------------------------------
// ParseCodeError
// ---------------------------------------------------------------------------

/// A stored status/response string did not match any known code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCodeError {
    pub what: &'static str,
    pub value: String,
}

impl ParseCodeError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {:?}", self.what, self.value)
    }
}

impl std::error::Error for ParseCodeError {}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The authenticated caller of an operation, as supplied by the identity
/// boundary. The core trusts these flags and performs its own authorization
/// checks against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_staff: bool,
    pub is_lender: bool,
}

impl Actor {
    /// A synthetic staff actor for operator tooling.
    pub fn staff(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_staff: true,
            is_lender: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ReviewStats
// ---------------------------------------------------------------------------

/// Aggregate review statistics for a listing. Always derived by query,
/// never stored. The average is rendered to two decimal places from integer
/// totals so no float enters the data path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    /// `"4.50"`-style rendering; `None` when there are no reviews.
    pub average_rating: Option<String>,
    pub review_count: i64,
}

impl ReviewStats {
    /// Build stats from `COUNT(rating)` and `SUM(rating)` totals.
    /// Rounds half-up to two decimals using integer arithmetic only.
    pub fn from_totals(count: i64, sum: i64) -> Self {
        if count <= 0 {
            return Self {
                average_rating: None,
                review_count: 0,
            };
        }
        let hundredths = (sum * 100 + count / 2) / count;
        Self {
            average_rating: Some(format!("{}.{:02}", hundredths / 100, hundredths % 100)),
            review_count: count,
        }
    }
}
