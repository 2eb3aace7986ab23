use axum::{middleware::from_fn, routing::get, Router};

use crate::handlers::campaign_handlers::{
    coming_to_end_campaigns, get_campaign, get_campaigns, most_popular_campaigns, my_donations,
    upcoming_campaigns,
};
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn campaign_routes() -> Router<AppState> {
    Router::new()
        // GET /api/campaigns - published Running/Upcoming campaigns
        .route("/", get(get_campaigns))
        // GET /api/campaigns/popular - descending total raised
        .route("/popular", get(most_popular_campaigns))
        // GET /api/campaigns/coming-to-end - ascending urgency
        .route("/coming-to-end", get(coming_to_end_campaigns))
        // GET /api/campaigns/upcoming
        .route("/upcoming", get(upcoming_campaigns))
        // GET /api/campaigns/:id - enriched detail
        .route("/:id", get(get_campaign))
        .route_layer(from_fn(auth_middleware))
}

pub fn donation_routes() -> Router<AppState> {
    Router::new()
        // GET /api/donations/me - donor's own history
        .route("/me", get(my_donations))
        .route_layer(from_fn(auth_middleware))
}
