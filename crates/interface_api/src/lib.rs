//! HTTP API Layer
//!
//! REST API for the bill reconciliation engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: bill, trip and health endpoints
//! - **Middleware**: JWT authentication, audit logging, request ids, tracing
//! - **DTOs**: camelCase request/response bodies
//! - **Error Handling**: `ApiError` maps domain errors onto status codes
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/health`, `/health/ready` | liveness, adapter health |
//! | POST | `/api/v1/bills` | create a bill shell |
//! | POST | `/api/v1/bills/recompute` | stateless editor recomputation |
//! | GET / DELETE | `/api/v1/bills/:id` | load / delete a bill |
//! | GET | `/api/v1/bills/:id/draft` | re-open a bill for editing |
//! | PUT | `/api/v1/bills/:id/confirm` | confirm (replace) a bill's state |
//! | POST | `/api/v1/bills/:id/receipt` | attach a parsed receipt |
//! | GET | `/api/v1/trips/:id/bills` | list a trip's bills |
//! | GET | `/api/v1/trips/:id/balances` | net balances of a trip |
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(bill_service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_bills::BillService;

use crate::config::ApiConfig;
use crate::handlers::{bills, health, trips};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bills: BillService,
    pub config: ApiConfig,
}

/// Creates the main API router
pub fn create_router(bills: BillService, config: ApiConfig) -> Router {
    let state = AppState { bills, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let bill_routes = Router::new()
        .route("/", post(bills::create_bill))
        .route("/recompute", post(bills::recompute))
        .route("/:id", get(bills::get_bill).delete(bills::delete_bill))
        .route("/:id/draft", get(bills::get_draft))
        .route("/:id/confirm", put(bills::confirm_bill))
        .route("/:id/receipt", post(bills::attach_receipt));

    let trip_routes = Router::new()
        .route("/:id/bills", get(trips::list_bills))
        .route("/:id/balances", get(trips::balances));

    // Audit runs inside auth so it sees the caller
    let api_routes = Router::new()
        .nest("/bills", bill_routes)
        .nest("/trips", trip_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
