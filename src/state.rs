use mongodb::Database;
use std::sync::Arc;

use crate::services::reconciliation::ReconciliationEngine;
use crate::services::webhook_auth::WebhookAuthenticator;

/// Everything the payment endpoints need. Built once at startup when
/// Paystack is configured; absent, the endpoints answer 503 and the
/// webhook acknowledges without acting.
pub struct PaymentService {
    pub engine: ReconciliationEngine,
    pub webhook_auth: WebhookAuthenticator,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub payments: Option<Arc<PaymentService>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db, payments: None }
    }

    pub fn with_payments(mut self, payments: Arc<PaymentService>) -> Self {
        self.payments = Some(payments);
        self
    }
}
