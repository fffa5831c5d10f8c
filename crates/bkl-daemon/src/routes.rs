//! Axum router and all HTTP handlers for bkl-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. Identity arrives as a trusted `x-actor-id`
//! header; every authorization decision beyond "who is calling" lives in
//! the domain layer, not here.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bkl_orders::Error;
use bkl_schemas::Actor;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api_types::{
    ApiError, AvailabilityQuery, AvailabilityResponse, BlockDatesRequest, CreateListingRequest,
    CreateListingReviewRequest, CreateOrderRequest, CreateUserRequest, CreateUserReviewRequest,
    HealthResponse, ListingDetailResponse, ListingPayload, ListingReviewPayload, ListingsResponse,
    OrderPayload, OrdersQuery, OrdersResponse, RespondOrderRequest, SaveListingRequest,
    SavedPayload, SavedResponse, UpdateListingRequest, UserPayload, UserReviewPayload,
};
use crate::state::AppState;

/// Trusted identity header supplied by the auth boundary in front of us.
pub const ACTOR_HEADER: &str = "x-actor-id";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/users", post(create_user))
        .route("/v1/listings", post(create_listing).get(list_listings))
        .route("/v1/listings/:id", get(get_listing).patch(update_listing))
        .route("/v1/listings/:id/availability", get(get_availability))
        .route("/v1/listings/:id/blocked-dates", post(block_dates))
        .route("/v1/saved", post(save_listing).get(list_saved))
        .route("/v1/saved/:listing_id", delete(unsave_listing))
        .route("/v1/orders", post(create_order).get(list_orders))
        .route(
            "/v1/orders/:id",
            get(get_order).patch(respond_order).delete(delete_order),
        )
        .route("/v1/orders/:id/cancel", post(cancel_order))
        .route("/v1/reviews/listings", post(create_listing_review))
        .route("/v1/reviews/users", post(create_user_review))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a domain error onto its HTTP contract. Validation and conflict are
/// both 400 (the body's `kind` distinguishes them); storage failures are a
/// bare 500 with the detail kept in logs.
fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation(_) | Error::Conflict(_) => StatusCode::BAD_REQUEST,
        Error::Permission(_) => StatusCode::FORBIDDEN,
        Error::NotFound(..) => StatusCode::NOT_FOUND,
        Error::Decode(_) | Error::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(kind = err.kind(), "request failed: {err}");
        return (
            status,
            Json(ApiError::new(err.kind(), "internal error")),
        )
            .into_response();
    }

    warn!(kind = err.kind(), "request refused: {err}");
    (status, Json(ApiError::new(err.kind(), err.to_string()))).into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new("unauthorized", message)),
    )
        .into_response()
}

/// Resolve the acting user from the identity header. Missing or unknown
/// actors are 401; everything downstream trusts the loaded flags.
async fn require_actor(st: &AppState, headers: &HeaderMap) -> Result<Actor, Response> {
    let raw = match headers.get(ACTOR_HEADER).and_then(|v| v.to_str().ok()) {
        Some(v) => v,
        None => return Err(unauthorized("missing x-actor-id header")),
    };
    let user_id: Uuid = match raw.parse() {
        Ok(id) => id,
        Err(_) => return Err(unauthorized("x-actor-id is not a valid uuid")),
    };
    match bkl_db::load_actor(&st.pool, user_id).await {
        Ok(actor) => Ok(actor),
        Err(Error::NotFound(..)) => Err(unauthorized("unknown actor")),
        Err(err) => Err(error_response(err)),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let (db_ok, has_orders_table) = match bkl_db::status(&st.pool).await {
        Ok(s) => (s.ok, s.has_orders_table),
        Err(_) => (false, false),
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            db_ok,
            has_orders_table,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/users
// ---------------------------------------------------------------------------

/// Registration. This route is open: the auth collaborator in front of the
/// daemon decides who may call it, and it can never mint staff.
pub(crate) async fn create_user(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    let display_name = if req.display_name.trim().is_empty() {
        req.username.clone()
    } else {
        req.display_name
    };
    let new = bkl_db::NewUser {
        user_id: Uuid::new_v4(),
        username: req.username,
        display_name,
        is_staff: false,
        is_lender: req.is_lender,
    };

    match bkl_db::insert_user(&st.pool, &new).await {
        Ok(row) => {
            info!(user_id = %row.user_id, username = %row.username, "user/create");
            (StatusCode::CREATED, Json(UserPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/listings  GET /v1/listings
// ---------------------------------------------------------------------------

pub(crate) async fn create_listing(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateListingRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let new = bkl_db::NewListing {
        listing_id: Uuid::new_v4(),
        owner_id: actor.user_id,
        title: req.title,
        price_cents: req.price_cents,
        tags: req.tags,
    };

    match bkl_db::insert_listing(&st.pool, &new).await {
        Ok(row) => {
            info!(listing_id = %row.listing_id, owner_id = %row.owner_id, "listing/create");
            (StatusCode::CREATED, Json(ListingPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ListingsQuery {
    tag: Option<String>,
}

pub(crate) async fn list_listings(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListingsQuery>,
) -> Response {
    match bkl_db::list_listings(&st.pool, q.tag.as_deref()).await {
        Ok(rows) => {
            let listings = rows.iter().map(ListingPayload::from_row).collect();
            (StatusCode::OK, Json(ListingsResponse { listings })).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/listings/:id  PATCH /v1/listings/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_listing(
    State(st): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
) -> Response {
    let listing = match bkl_db::fetch_listing(&st.pool, listing_id).await {
        Ok(row) => row,
        Err(err) => return error_response(err),
    };
    let review_stats = match bkl_db::reviews::listing_review_stats(&st.pool, listing_id).await {
        Ok(s) => s,
        Err(err) => return error_response(err),
    };
    let blocked_days = match bkl_db::availability::blocked_days(&st.pool, listing_id).await {
        Ok(d) => d,
        Err(err) => return error_response(err),
    };

    (
        StatusCode::OK,
        Json(ListingDetailResponse {
            listing: ListingPayload::from_row(&listing),
            review_stats,
            blocked_days,
        }),
    )
        .into_response()
}

pub(crate) async fn update_listing(
    State(st): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateListingRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let patch = bkl_db::ListingPatch {
        title: req.title,
        price_cents: req.price_cents,
        tags: req.tags,
    };

    match bkl_db::update_listing(&st.pool, &actor, listing_id, &patch).await {
        Ok(row) => {
            info!(listing_id = %row.listing_id, actor_id = %actor.user_id, "listing/update");
            (StatusCode::OK, Json(ListingPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/listings/:id/availability
// ---------------------------------------------------------------------------

pub(crate) async fn get_availability(
    State(st): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    Query(q): Query<AvailabilityQuery>,
) -> Response {
    // Listing must exist; an availability answer for a phantom listing
    // would always be "true".
    if let Err(err) = bkl_db::fetch_listing(&st.pool, listing_id).await {
        return error_response(err);
    }
    let span = match bkl_orders::DateSpan::new(q.start, q.end) {
        Ok(s) => s,
        Err(err) => return error_response(err),
    };

    match bkl_db::availability::is_range_available(&st.pool, listing_id, &span).await {
        Ok(available) => (
            StatusCode::OK,
            Json(AvailabilityResponse {
                listing_id,
                start: span.start(),
                end: span.end(),
                available,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/listings/:id/blocked-dates
// ---------------------------------------------------------------------------

/// Manual blackout: idempotently block a range on the calendar. Re-posting
/// the same range is a no-op by design.
pub(crate) async fn block_dates(
    State(st): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<BlockDatesRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let listing = match bkl_db::fetch_listing(&st.pool, listing_id).await {
        Ok(row) => row,
        Err(err) => return error_response(err),
    };
    if let Err(err) = bkl_orders::lifecycle::ensure_may_block_dates(&actor, listing.owner_id) {
        return error_response(err);
    }
    let span = match bkl_orders::DateSpan::new(req.start, req.end) {
        Ok(s) => s,
        Err(err) => return error_response(err),
    };

    match bkl_db::availability::block_range(&st.pool, listing_id, &span).await {
        Ok(newly_blocked) => {
            info!(listing_id = %listing_id, span = %span, newly_blocked, "listing/block-dates");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/saved  GET /v1/saved  DELETE /v1/saved/:listing_id
// ---------------------------------------------------------------------------

/// Bookmark a listing. Bookmarks are private: every operation here acts
/// on the calling user's own set and nothing else.
pub(crate) async fn save_listing(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SaveListingRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::saved::save_listing(&st.pool, actor.user_id, req.listing_id).await {
        Ok(row) => {
            info!(listing_id = %row.listing_id, user_id = %row.user_id, "saved/create");
            (StatusCode::CREATED, Json(SavedPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_saved(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::saved::list_saved(&st.pool, actor.user_id).await {
        Ok(rows) => {
            let saved = rows.iter().map(SavedPayload::from_row).collect();
            (StatusCode::OK, Json(SavedResponse { saved })).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn unsave_listing(
    State(st): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::saved::unsave_listing(&st.pool, actor.user_id, listing_id).await {
        Ok(()) => {
            info!(listing_id = %listing_id, user_id = %actor.user_id, "saved/delete");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders  GET /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let new = bkl_db::orders::NewOrder {
        listing_id: req.listing_id,
        requested_date: req.requested_date.unwrap_or_else(|| Utc::now().date_naive()),
        start_date: req.start_date,
        end_date: req.end_date,
    };

    match bkl_db::orders::create_order(&st.pool, &actor, &new).await {
        Ok(row) => {
            info!(
                order_id = %row.order_id,
                listing_id = %row.listing_id,
                renter_id = %row.renter_id,
                subtotal_cents = row.subtotal_cents,
                "order/create"
            );
            (StatusCode::CREATED, Json(OrderPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<OrdersQuery>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    let result = match q.role.as_deref() {
        None | Some("renter") => {
            bkl_db::orders::list_orders_for_renter(&st.pool, actor.user_id).await
        }
        Some("lender") => bkl_db::orders::list_orders_for_lender(&st.pool, actor.user_id).await,
        Some(other) => {
            return error_response(Error::validation(format!(
                "unknown role {other:?}; expected \"renter\" or \"lender\""
            )))
        }
    };

    match result {
        Ok(rows) => {
            let orders = rows.iter().map(OrderPayload::from_row).collect();
            (StatusCode::OK, Json(OrdersResponse { orders })).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let order = match bkl_db::orders::fetch_order(&st.pool, order_id).await {
        Ok(row) => row,
        Err(err) => return error_response(err),
    };
    if let Err(err) =
        bkl_orders::lifecycle::ensure_may_view(&actor, order.renter_id, order.lender_id)
    {
        return error_response(err);
    }

    (StatusCode::OK, Json(OrderPayload::from_row(&order))).into_response()
}

// ---------------------------------------------------------------------------
// PATCH /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn respond_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<RespondOrderRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    // Clients that send both fields must send a consistent pair.
    if let Some(status) = req.status {
        if status != req.response.resulting_status() {
            return error_response(Error::validation(format!(
                "status {} does not match lender_response {}",
                status.as_str(),
                req.response.as_str()
            )));
        }
    }

    match bkl_db::orders::respond_to_order(&st.pool, &actor, order_id, req.response).await {
        Ok(row) => {
            info!(
                order_id = %row.order_id,
                status = row.status.as_str(),
                actor_id = %actor.user_id,
                "order/respond"
            );
            (StatusCode::OK, Json(OrderPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/cancel
// ---------------------------------------------------------------------------

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::orders::cancel_order(&st.pool, &actor, order_id).await {
        Ok(row) => {
            info!(order_id = %row.order_id, actor_id = %actor.user_id, "order/cancel");
            (StatusCode::OK, Json(OrderPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// DELETE /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn delete_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::orders::delete_order(&st.pool, &actor, order_id).await {
        Ok(()) => {
            info!(order_id = %order_id, actor_id = %actor.user_id, "order/delete");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/reviews/listings  POST /v1/reviews/users
// ---------------------------------------------------------------------------

pub(crate) async fn create_listing_review(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateListingReviewRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::reviews::create_listing_review(
        &st.pool,
        &actor,
        req.listing_id,
        req.rating,
        &req.body,
    )
    .await
    {
        Ok(row) => {
            info!(review_id = %row.review_id, listing_id = %row.listing_id, "review/listing");
            (
                StatusCode::CREATED,
                Json(ListingReviewPayload::from_row(&row)),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_user_review(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateUserReviewRequest>,
) -> Response {
    let actor = match require_actor(&st, &headers).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    match bkl_db::reviews::create_user_review(&st.pool, &actor, req.renter_id, req.rating, &req.body)
        .await
    {
        Ok(row) => {
            info!(review_id = %row.review_id, renter_id = %row.renter_id, "review/user");
            (StatusCode::CREATED, Json(UserReviewPayload::from_row(&row))).into_response()
        }
        Err(err) => error_response(err),
    }
}
