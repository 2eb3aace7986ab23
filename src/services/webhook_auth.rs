// services/webhook_auth.rs
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Validates the `x-paystack-signature` header: hex-encoded HMAC-SHA-512
/// over the exact raw request body, keyed by the shared secret. Must run
/// before any JSON parsing of the body.
#[derive(Clone)]
pub struct WebhookAuthenticator {
    secret: Vec<u8>,
}

impl WebhookAuthenticator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        WebhookAuthenticator {
            secret: secret.into(),
        }
    }

    /// Constant-time comparison via `Mac::verify_slice`.
    pub fn verify(&self, raw_body: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha512::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(raw_body);
        mac.verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let auth = WebhookAuthenticator::new("sk_test_secret");
        let body = br#"{"event":"charge.success","data":{"reference":"PS_1"}}"#;
        let sig = sign(b"sk_test_secret", body);
        assert!(auth.verify(body, &sig));
    }

    #[test]
    fn rejects_wrong_secret() {
        let auth = WebhookAuthenticator::new("sk_test_secret");
        let body = br#"{"event":"charge.success"}"#;
        let sig = sign(b"some_other_secret", body);
        assert!(!auth.verify(body, &sig));
    }

    #[test]
    fn rejects_tampered_body() {
        let auth = WebhookAuthenticator::new("sk_test_secret");
        let sig = sign(b"sk_test_secret", br#"{"data":{"amount":5000}}"#);
        assert!(!auth.verify(br#"{"data":{"amount":9000}}"#, &sig));
    }

    #[test]
    fn rejects_malformed_hex() {
        let auth = WebhookAuthenticator::new("sk_test_secret");
        assert!(!auth.verify(b"{}", "not-hex-at-all"));
        assert!(!auth.verify(b"{}", ""));
    }
}
