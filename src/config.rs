// config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    // read for completeness; only used client-side
    pub public_key: String,
    pub webhook_secret: Option<String>,
    pub public_host: String,
    pub default_currency: String,
}

impl PaystackConfig {
    /// None when `PAYSTACK_SECRET_KEY` is absent, in which case the API
    /// starts with payments disabled.
    pub fn from_env() -> Option<Self> {
        let secret_key = env::var("PAYSTACK_SECRET_KEY").ok()?;

        Some(PaystackConfig {
            secret_key,
            public_key: env::var("PAYSTACK_PUBLIC_KEY").unwrap_or_default(),
            webhook_secret: env::var("PAYSTACK_WEBHOOK_SECRET").ok(),
            public_host: env::var("PUBLIC_HOST")
                .unwrap_or_else(|_| "https://your-api.com".to_string()),
            default_currency: env::var("DEFAULT_CURRENCY")
                .unwrap_or_else(|_| "GHS".to_string()),
        })
    }

    pub fn base_url(&self) -> &'static str {
        "https://api.paystack.co"
    }

    /// Paystack-hosted pages bounce the browser back here; the return
    /// handler then forwards into the app deep link.
    pub fn callback_url(&self) -> String {
        format!("{}/api/payments/paystack/return", self.public_host)
    }

    /// Secret used to authenticate inbound webhooks. Falls back to the API
    /// secret when no dedicated webhook secret is configured.
    pub fn webhook_signing_secret(&self) -> &str {
        self.webhook_secret.as_deref().unwrap_or(&self.secret_key)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}
