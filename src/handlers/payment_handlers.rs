// handlers/payment_handlers.rs
//
// Outward-facing adapters for the reconciliation engine. The mobile
// client speaks the legacy `{ data: { success, message, error } }`
// envelope, so the typed engine outcomes are translated here and
// nowhere else.
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use validator::Validate;

use crate::errors::AppError;
use crate::models::donation::PaymentStatus;
use crate::models::user::Claims;
use crate::services::reconciliation::{CreateDonation, WebhookDisposition, WebhookEvent};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[serde(rename = "campaignId")]
    pub campaign_id: String,
    #[serde(rename = "amountMajor")]
    #[validate(range(min = 0.01, message = "amount must be positive"))]
    pub amount_major: f64,
    pub currency: Option<String>,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub reference: Option<String>,
    pub status: Option<String>,
}

fn envelope(success: u8, message: &str, extra: Value) -> Json<Value> {
    let mut data = json!({
        "success": success,
        "message": message,
        "error": if success == 1 { 0 } else { 1 },
    });
    if let (Some(data_map), Some(extra_map)) = (data.as_object_mut(), extra.as_object()) {
        for (key, value) in extra_map {
            data_map.insert(key.clone(), value.clone());
        }
    }
    Json(json!({ "data": data }))
}

// POST /api/payments/paystack/create
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePaymentRequest>,
) -> impl IntoResponse {
    let Some(payments) = &state.payments else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            envelope(0, "Payment service is not available", json!({})),
        );
    };

    if payload.validate().is_err() {
        return (
            StatusCode::OK,
            envelope(0, "Missing required fields", json!({})),
        );
    }

    let Ok(user_id) = ObjectId::parse_str(&claims.sub) else {
        return (StatusCode::OK, envelope(0, "Invalid user id", json!({})));
    };
    let Ok(campaign_id) = ObjectId::parse_str(&payload.campaign_id) else {
        return (StatusCode::OK, envelope(0, "Invalid campaign id", json!({})));
    };

    let request = CreateDonation {
        user_id,
        campaign_id,
        amount_major: payload.amount_major,
        currency: payload.currency,
        email: payload.email,
    };

    match payments.engine.create(request).await {
        Ok(outcome) => {
            let message = if outcome.reused {
                "Reusing pending Paystack transaction"
            } else {
                "Init ok"
            };
            info!("Payment create ok: ref={}", outcome.reference);
            (
                StatusCode::OK,
                envelope(
                    1,
                    message,
                    json!({
                        "reference": outcome.reference,
                        "authorizationUrl": outcome.authorization_url,
                    }),
                ),
            )
        }
        Err(AppError::ValidationError(message)) => {
            (StatusCode::OK, envelope(0, &message, json!({})))
        }
        Err(AppError::PaystackError(_)) => (
            StatusCode::OK,
            envelope(0, "Failed to create Paystack transaction", json!({})),
        ),
        Err(e) => {
            error!("paystackCreate error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", json!({})),
            )
        }
    }
}

// POST /api/payments/paystack/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> impl IntoResponse {
    let Some(payments) = &state.payments else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            envelope(0, "Payment service is not available", json!({"status": "failed"})),
        );
    };

    if payload.reference.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "reference is required", json!({"status": "failed"})),
        );
    }

    match payments.engine.verify(&payload.reference).await {
        // The gateway answered without transaction data; the donation was
        // finalized Failed without a comparison, which the client sees as
        // a plain verification failure.
        Ok(outcome) if outcome.gateway_empty => (
            StatusCode::OK,
            envelope(0, "Verification failed", json!({"status": "failed"})),
        ),
        Ok(outcome) => {
            let status = if outcome.status == PaymentStatus::Successful {
                "success"
            } else {
                "failed"
            };
            let message = if outcome.already_final {
                "Already verified"
            } else {
                "Verification checked"
            };
            (
                StatusCode::OK,
                envelope(
                    1,
                    message,
                    json!({
                        "status": status,
                        "amount": outcome.amount_minor,
                        "currency": outcome.currency,
                    }),
                ),
            )
        }
        Err(AppError::UnknownReference(_)) => (
            StatusCode::OK,
            envelope(0, "Unknown reference", json!({"status": "failed"})),
        ),
        Err(e) => {
            // Transport/store failure: the donation stays Pending and the
            // client may retry.
            error!("paystackVerify error: {}", e);
            (
                StatusCode::OK,
                envelope(0, "Verification error", json!({"status": "failed"})),
            )
        }
    }
}

// GET /api/payments/paystack/return
//
// Browser bounce from the Paystack-hosted page; forwards the outcome
// into the native app deep link. Carries no state logic.
pub async fn paystack_return(Query(query): Query<ReturnQuery>) -> impl IntoResponse {
    let pairs = [
        ("reference", query.reference.unwrap_or_default()),
        ("status", query.status.unwrap_or_default()),
    ];
    match serde_urlencoded::to_string(pairs) {
        Ok(qs) => {
            let deep_link = format!("onepower://paystack/callback?{}", qs);
            Redirect::to(&deep_link).into_response()
        }
        Err(e) => {
            error!("paystackReturn error: {}", e);
            "You can close this window now.".into_response()
        }
    }
}

// POST /api/webhooks/paystack
//
// Signature check runs over the exact raw bytes before any parsing.
// The gateway always gets HTTP 200, whatever happens internally, to
// keep its retry machinery quiet; failures are only logged.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> impl IntoResponse {
    let Some(payments) = &state.payments else {
        warn!("Webhook received while payments are disabled");
        return (StatusCode::OK, "ignored");
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("Webhook missing {} header", SIGNATURE_HEADER);
        return (StatusCode::OK, "missing signature; ignored");
    };

    if !payments.webhook_auth.verify(&body, signature) {
        warn!("Webhook signature mismatch");
        return (StatusCode::OK, "invalid signature; ignored");
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Unparseable webhook body: {}", e);
            return (StatusCode::OK, "unparseable event; ignored");
        }
    };

    match payments.engine.apply_webhook(event).await {
        Ok(WebhookDisposition::Finalized(status)) => {
            info!("Webhook finalized donation as {}", status.as_str());
            (StatusCode::OK, "OK")
        }
        Ok(WebhookDisposition::Ignored(why)) => (StatusCode::OK, why),
        Err(e) => {
            error!("paystackWebhook error: {}", e);
            (StatusCode::OK, "OK")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaystackConfig;
    use crate::errors::Result;
    use crate::models::donation::Donation;
    use crate::services::donation_store::memory::MemoryDonationStore;
    use crate::services::donation_store::DonationStore;
    use crate::services::paystack::{
        InitializeData, InitializeRequest, PaymentGateway, VerifyData,
    };
    use crate::services::reconciliation::{ReconciliationEngine, PAYMENT_METHOD};
    use crate::services::webhook_auth::WebhookAuthenticator;
    use crate::state::PaymentService;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use hmac::{Hmac, Mac};
    use mongodb::bson::DateTime as BsonDateTime;
    use sha2::Sha512;
    use std::sync::Arc;
    use tower::ServiceExt;

    const WEBHOOK_SECRET: &str = "whsec_test";

    /// Gateway whose verify answers with no transaction data. Initialize
    /// is never reached by these tests.
    struct EmptyVerifyGateway;

    #[async_trait]
    impl PaymentGateway for EmptyVerifyGateway {
        async fn initialize(&self, _request: &InitializeRequest) -> Result<InitializeData> {
            Err(AppError::paystack("not used"))
        }

        async fn verify(&self, _reference: &str) -> Result<Option<VerifyData>> {
            Ok(None)
        }
    }

    fn pending_donation(reference: &str) -> Donation {
        Donation {
            id: Some(ObjectId::new()),
            date: "2026-08-30".to_string(),
            user_id: Some(ObjectId::new()),
            campaign_id: ObjectId::new(),
            amount: 100.0,
            currency: "GHS".to_string(),
            payment_method: PAYMENT_METHOD.to_string(),
            transaction_id: reference.to_string(),
            payment_status: PaymentStatus::Pending,
            failure_reason: String::new(),
            flagged: false,
            created_at: BsonDateTime::now(),
            updated_at: BsonDateTime::now(),
        }
    }

    /// State over the in-memory store; the Database handle is parsed but
    /// never connected, and these handlers never touch it.
    async fn test_state() -> (AppState, Arc<MemoryDonationStore>) {
        let db = mongodb::Client::with_uri_str("mongodb://127.0.0.1:27017")
            .await
            .unwrap()
            .database("onepowerdb_test");

        let config = PaystackConfig {
            secret_key: "sk_test".to_string(),
            public_key: "pk_test".to_string(),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            public_host: "https://api.test".to_string(),
            default_currency: "GHS".to_string(),
        };
        let store = Arc::new(MemoryDonationStore::default());
        let engine =
            ReconciliationEngine::new(store.clone(), Arc::new(EmptyVerifyGateway), config.clone());
        let payments = Arc::new(PaymentService {
            engine,
            webhook_auth: WebhookAuthenticator::new(config.webhook_signing_secret()),
        });

        (AppState::new(db).with_payments(payments), store)
    }

    fn webhook_app(state: AppState) -> Router {
        Router::new()
            .route("/api/webhooks/paystack", post(paystack_webhook))
            .with_state(state)
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn success_webhook_body(reference: &str) -> String {
        format!(
            r#"{{"event":"charge.success","data":{{"reference":"{}","amount":10000,"currency":"GHS","status":"success"}}}}"#,
            reference
        )
    }

    async fn post_webhook(app: Router, body: String, signature: Option<&str>) -> StatusCode {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/paystack");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        let response = app
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn webhook_bad_signature_answers_200_and_leaves_donation_pending() {
        let (state, store) = test_state().await;
        let reference = "PS_handler_bad_sig";
        store
            .create_pending(pending_donation(reference))
            .await
            .unwrap();

        let body = success_webhook_body(reference);
        let signature = sign("some_other_secret", body.as_bytes());
        let status = post_webhook(webhook_app(state), body, Some(&signature)).await;

        assert_eq!(status, StatusCode::OK);
        let stored = store.find_by_reference(reference).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn webhook_missing_signature_answers_200_and_leaves_donation_pending() {
        let (state, store) = test_state().await;
        let reference = "PS_handler_no_sig";
        store
            .create_pending(pending_donation(reference))
            .await
            .unwrap();

        let status = post_webhook(webhook_app(state), success_webhook_body(reference), None).await;

        assert_eq!(status, StatusCode::OK);
        let stored = store.find_by_reference(reference).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn webhook_valid_signature_finalizes_donation() {
        let (state, store) = test_state().await;
        let reference = "PS_handler_good_sig";
        store
            .create_pending(pending_donation(reference))
            .await
            .unwrap();

        let body = success_webhook_body(reference);
        let signature = sign(WEBHOOK_SECRET, body.as_bytes());
        let status = post_webhook(webhook_app(state), body, Some(&signature)).await;

        assert_eq!(status, StatusCode::OK);
        let stored = store.find_by_reference(reference).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Successful);
    }

    #[tokio::test]
    async fn verify_empty_gateway_response_reports_verification_failed() {
        let (state, store) = test_state().await;
        let reference = "PS_handler_empty_verify";
        store
            .create_pending(pending_donation(reference))
            .await
            .unwrap();

        let app = Router::new()
            .route("/api/payments/paystack/verify", post(verify_payment))
            .with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/paystack/verify")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"reference":"{}"}}"#, reference)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["data"]["success"], 0);
        assert_eq!(value["data"]["message"], "Verification failed");
        assert_eq!(value["data"]["status"], "failed");

        let stored = store.find_by_reference(reference).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }
}
