// services/reconciliation.rs
//
// Donation lifecycle state machine: NoDonation -> Pending -> {Successful,
// Failed}. Three entry points: create (transaction initialize), verify
// (client polling) and webhook apply. Verify and webhook can race for the
// same reference; both funnel through the store's idempotent `finalize`,
// so the first writer wins and the second observes a no-op.
use chrono::{Duration, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PaystackConfig;
use crate::errors::{AppError, Result};
use crate::models::donation::{to_minor_units, Donation, PaymentStatus};
use crate::services::donation_store::DonationStore;
use crate::services::paystack::{InitializeRequest, PaymentGateway};

pub const PAYMENT_METHOD: &str = "Paystack";

/// Window in which a repeated create for the same donor, campaign, amount
/// and currency reuses the pending reference instead of charging again.
const DEDUP_WINDOW_SECS: i64 = 120;

const SUCCESS_EVENT: &str = "charge.success";

#[derive(Debug, Clone)]
pub struct CreateDonation {
    pub user_id: ObjectId,
    pub campaign_id: ObjectId,
    pub amount_major: f64,
    pub currency: Option<String>,
    pub email: String,
}

#[derive(Debug)]
pub struct CreateOutcome {
    pub reference: String,
    pub authorization_url: Option<String>,
    /// True when an in-window pending donation was reused and no new
    /// gateway transaction was opened.
    pub reused: bool,
}

#[derive(Debug)]
pub struct VerifyOutcome {
    pub status: PaymentStatus,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    /// True when the stored record was already terminal and the gateway
    /// was not consulted.
    pub already_final: bool,
    /// True when the gateway answered without transaction data; the
    /// donation was finalized Failed without an integrity comparison.
    pub gateway_empty: bool,
}

/// Inbound webhook event, parsed only after signature authentication.
/// Every field is optional; Paystack's payload shape is not trusted.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookCharge>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookCharge {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Acknowledged without touching any record.
    Ignored(&'static str),
    Finalized(PaymentStatus),
}

pub struct ReconciliationEngine {
    store: Arc<dyn DonationStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: PaystackConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn DonationStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: PaystackConfig,
    ) -> Self {
        ReconciliationEngine {
            store,
            gateway,
            config,
        }
    }

    /// Transition 1: open a transaction at the gateway and persist the
    /// Pending donation. Nothing is persisted if the gateway call fails
    /// or returns no authorization URL, since nothing charged the donor.
    pub async fn create(&self, request: CreateDonation) -> Result<CreateOutcome> {
        if request.amount_major <= 0.0 {
            return Err(AppError::invalid_data("amount must be positive"));
        }
        if request.email.is_empty() {
            return Err(AppError::invalid_data("email is required"));
        }

        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.config.default_currency.clone());

        if let Some(existing) = self
            .store
            .find_pending_match(
                request.user_id,
                request.campaign_id,
                request.amount_major,
                &currency,
                PAYMENT_METHOD,
                Duration::seconds(DEDUP_WINDOW_SECS),
            )
            .await?
        {
            info!(
                "Reusing pending Paystack transaction {}",
                existing.transaction_id
            );
            return Ok(CreateOutcome {
                reference: existing.transaction_id,
                authorization_url: None,
                reused: true,
            });
        }

        let reference = generate_reference(&request.campaign_id);

        let init = self
            .gateway
            .initialize(&InitializeRequest {
                email: request.email.clone(),
                amount: to_minor_units(request.amount_major),
                currency: currency.clone(),
                reference: reference.clone(),
                callback_url: self.config.callback_url(),
                metadata: serde_json::json!({
                    "campaignId": request.campaign_id.to_hex(),
                    "userId": request.user_id.to_hex(),
                }),
            })
            .await?;

        let Some(authorization_url) = init.authorization_url else {
            warn!("Paystack initialize returned no authorization_url");
            return Err(AppError::paystack("no authorization URL in response"));
        };

        let donation = Donation {
            id: Some(ObjectId::new()),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            user_id: Some(request.user_id),
            campaign_id: request.campaign_id,
            amount: request.amount_major,
            currency,
            payment_method: PAYMENT_METHOD.to_string(),
            transaction_id: reference.clone(),
            payment_status: PaymentStatus::Pending,
            failure_reason: String::new(),
            flagged: false,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        self.store.create_pending(donation).await?;

        info!("Created pending donation ref={}", reference);
        Ok(CreateOutcome {
            reference,
            authorization_url: Some(authorization_url),
            reused: false,
        })
    }

    /// Transition 2: client-polled confirmation. Terminal records are
    /// returned unchanged without consulting the gateway. Transport
    /// failures propagate and leave the donation Pending (retryable);
    /// only a structurally valid gateway answer finalizes.
    pub async fn verify(&self, reference: &str) -> Result<VerifyOutcome> {
        let donation = self
            .store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))?;

        if donation.payment_status.is_terminal() {
            return Ok(VerifyOutcome {
                status: donation.payment_status,
                amount_minor: Some(donation.amount_minor()),
                currency: Some(donation.currency),
                already_final: true,
                gateway_empty: false,
            });
        }

        let id = donation.id.ok_or(AppError::DonationNotFound)?;

        let Some(data) = self.gateway.verify(reference).await? else {
            let finalized = self
                .store
                .finalize(id, PaymentStatus::Failed, "empty verification response", false)
                .await?;
            return Ok(VerifyOutcome {
                status: finalized.payment_status,
                amount_minor: None,
                currency: None,
                already_final: false,
                gateway_empty: true,
            });
        };

        let status_ok = data
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("success"))
            .unwrap_or(false);
        let status_note = format!("ps_status={}", data.status.as_deref().unwrap_or("none"));

        let (outcome, reason, flagged) = match_gateway(
            &donation,
            status_ok,
            &status_note,
            data.amount,
            data.currency.as_deref(),
        );

        // Idempotent; a concurrent webhook may already have won, in which
        // case the stored state is reported rather than ours.
        let finalized = self.store.finalize(id, outcome, &reason, flagged).await?;

        info!(
            "Verify finalized ref={} status={}",
            reference,
            finalized.payment_status.as_str()
        );
        Ok(VerifyOutcome {
            status: finalized.payment_status,
            amount_minor: data.amount,
            currency: data.currency,
            already_final: false,
            gateway_empty: false,
        })
    }

    /// Transition 3: gateway-pushed confirmation, called only after the
    /// signature has been authenticated. Unknown references and terminal
    /// records are acknowledged as no-ops (at-least-once delivery).
    pub async fn apply_webhook(&self, event: WebhookEvent) -> Result<WebhookDisposition> {
        let Some(charge) = event.data else {
            return Ok(WebhookDisposition::Ignored("missing payload"));
        };
        let Some(reference) = charge.reference.as_deref() else {
            return Ok(WebhookDisposition::Ignored("missing reference"));
        };

        let Some(donation) = self.store.find_by_reference(reference).await? else {
            return Ok(WebhookDisposition::Ignored("unknown reference"));
        };
        if donation.payment_status.is_terminal() {
            return Ok(WebhookDisposition::Ignored("already processed"));
        }

        let id = donation.id.ok_or(AppError::DonationNotFound)?;

        let event_ok = event.event.as_deref() == Some(SUCCESS_EVENT);
        let event_note = format!("event={}", event.event.as_deref().unwrap_or("none"));

        let (outcome, reason, flagged) = match_gateway(
            &donation,
            event_ok,
            &event_note,
            charge.amount,
            charge.currency.as_deref(),
        );

        let finalized = self.store.finalize(id, outcome, &reason, flagged).await?;

        info!(
            "Webhook finalized ref={} status={}",
            reference,
            finalized.payment_status.as_str()
        );
        Ok(WebhookDisposition::Finalized(finalized.payment_status))
    }
}

/// Unique reference embedding the campaign, a timestamp and a random
/// component. The store's unique index is the backstop against collisions.
fn generate_reference(campaign_id: &ObjectId) -> String {
    let random: u32 = rand::thread_rng().gen_range(1_000_000..10_000_000);
    format!(
        "PS_{}_{}_{}",
        campaign_id.to_hex(),
        Utc::now().timestamp_millis(),
        random
    )
}

/// Integrity check against the gateway's claim: status/event code,
/// minor-unit amount and case-insensitive currency must all agree.
/// `flagged` marks amount/currency mismatches, distinguishing tampered
/// or inconsistent data from a plain non-payment.
fn match_gateway(
    donation: &Donation,
    status_ok: bool,
    status_note: &str,
    gateway_amount: Option<i64>,
    gateway_currency: Option<&str>,
) -> (PaymentStatus, String, bool) {
    let amount_minor = donation.amount_minor();
    let amount_matches = gateway_amount == Some(amount_minor);
    let currency_matches = gateway_currency
        .unwrap_or("")
        .eq_ignore_ascii_case(&donation.currency);

    if status_ok && amount_matches && currency_matches {
        return (PaymentStatus::Successful, String::new(), false);
    }

    let mut reasons = Vec::new();
    if !status_ok {
        reasons.push(status_note.to_string());
    }
    if !amount_matches {
        reasons.push(format!(
            "amount_mismatch ps={} our={}",
            gateway_amount.map_or_else(|| "none".to_string(), |a| a.to_string()),
            amount_minor
        ));
    }
    if !currency_matches {
        reasons.push(format!(
            "currency_mismatch ps={} our={}",
            gateway_currency.unwrap_or("none"),
            donation.currency
        ));
    }

    let flagged = !amount_matches || !currency_matches;
    (PaymentStatus::Failed, reasons.join("; "), flagged)
}
