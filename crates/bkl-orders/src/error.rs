//! The domain error shared by every backline operation.
//!
//! Library code returns [`Error`]; the HTTP layer maps each variant to a
//! status code and the CLI renders it through anyhow. Unique-constraint
//! collisions on the known race-prone constraints are translated into
//! [`Error::Conflict`] here so no raw storage error escapes to callers.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input or business-rule violation: self-order, unavailable dates,
    /// inverted ranges, review-gate failures. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// The actor is not authorized for the requested operation. HTTP 403.
    #[error("{0}")]
    Permission(String),

    /// A referenced entity does not exist. HTTP 404.
    #[error("{0} {1} not found")]
    NotFound(&'static str, Uuid),

    /// A uniqueness race lost at the persistence layer: a date blocked by a
    /// concurrent writer, a duplicate review, a taken username. HTTP 400
    /// with kind `conflict`.
    #[error("{0}")]
    Conflict(String),

    /// A stored status string failed to decode into its enum. Indicates
    /// schema drift or a manual data edit. HTTP 500.
    #[error("corrupt stored value: {0}")]
    Decode(#[from] bkl_schemas::ParseCodeError),

    /// Any other database failure. HTTP 500; detail goes to logs, not to
    /// the response body.
    #[error("database error: {0}")]
    Db(sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Error::Permission(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// Stable machine-readable kind, used in HTTP error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Permission(_) => "permission",
            Error::NotFound(..) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Decode(_) => "decode",
            Error::Db(_) => "db",
        }
    }
}

/// Unique constraints whose violation is an expected race outcome rather
/// than a bug, paired with the message surfaced to the caller.
const CONFLICT_CONSTRAINTS: &[(&str, &str)] = &[
    (
        "uq_blocked_dates_listing_day",
        "date already blocked for this listing",
    ),
    (
        "uq_listing_reviews_reviewer_listing",
        "listing already reviewed by this user",
    ),
    (
        "uq_user_reviews_lender_renter",
        "renter already reviewed by this lender",
    ),
    (
        "uq_saved_listings_user_listing",
        "listing already saved by this user",
    ),
    ("users_username_key", "username already taken"),
];

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            // SQLSTATE 23505 = unique_violation.
            if db_err.code().as_deref() == Some("23505") {
                if let Some(name) = db_err.constraint() {
                    for (constraint, message) in CONFLICT_CONSTRAINTS {
                        if name == *constraint {
                            return Error::Conflict((*message).to_string());
                        }
                    }
                    return Error::Conflict(format!("unique constraint violated: {name}"));
                }
                return Error::Conflict("unique constraint violated".to_string());
            }
        }
        Error::Db(e)
    }
}
