use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::handlers::payment_handlers;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    // Creation needs a donor identity; verify and the browser return
    // bounce are reachable without one.
    Router::new()
        .route(
            "/paystack/create",
            post(payment_handlers::create_payment).route_layer(from_fn(auth_middleware)),
        )
        .route("/paystack/verify", post(payment_handlers::verify_payment))
        .route("/paystack/return", get(payment_handlers::paystack_return))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/paystack", post(payment_handlers::paystack_webhook))
}
