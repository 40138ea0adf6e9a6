// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    // Order creation is a user action and requires authentication.
    let protected_routes = Router::new()
        .route("/orders", post(handlers::create_payment_order))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // The gateway callback carries no bearer token; its HMAC signature
    // is the authentication.
    let callback_routes = Router::new().route("/verify", post(handlers::verify_payment));

    Router::new()
        .merge(protected_routes)
        .merge(callback_routes)
        .with_state(state)
}
