use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod database;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, PaystackConfig};
use database::connection::{ensure_indexes, get_db_client};
use services::donation_store::MongoDonationStore;
use services::paystack::PaystackClient;
use services::reconciliation::ReconciliationEngine;
use services::webhook_auth::WebhookAuthenticator;
use state::{AppState, PaymentService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();

    let db = get_db_client(&config.database_url).await;
    ensure_indexes(&db).await;

    let app_state = initialize_app_state(db);

    let app = build_router(app_state);
    start_server(app, &config).await;
}

fn initialize_app_state(db: mongodb::Database) -> AppState {
    let app_state = AppState::new(db.clone());

    match PaystackConfig::from_env() {
        Some(paystack_config) => {
            tracing::info!("Paystack config loaded");
            tracing::info!("Default currency: {}", paystack_config.default_currency);

            let store = Arc::new(MongoDonationStore::new(&db));
            let gateway = Arc::new(PaystackClient::new(paystack_config.clone()));
            let webhook_auth =
                WebhookAuthenticator::new(paystack_config.webhook_signing_secret().as_bytes());
            let engine = ReconciliationEngine::new(store, gateway, paystack_config);

            tracing::info!("Payment service initialized and ready");
            app_state.with_payments(Arc::new(PaymentService {
                engine,
                webhook_auth,
            }))
        }
        None => {
            tracing::warn!("PAYSTACK_SECRET_KEY not set; payment service will be disabled");
            app_state
        }
    }
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/campaigns", routes::campaigns::campaign_routes())
        .nest("/api/donations", routes::campaigns::donation_routes())
        .nest("/api/payments", routes::payments::payment_routes())
        .nest("/api/webhooks", routes::payments::webhook_routes())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.port)));

    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "OnePower Crowdfunding API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "payments": state.payments.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
