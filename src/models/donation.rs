use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle of one payment attempt. `Pending` is the only non-terminal
/// state; a terminal record is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Successful => "Successful",
            PaymentStatus::Failed => "Failed",
        }
    }
}

/// One donation/payment attempt tied to one campaign and one donor.
/// `transaction_id` is the reference shared with Paystack and carries a
/// unique index; `amount` is always stored in major currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub date: String,
    // userId survives donor deletion as None
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    #[serde(rename = "campaignId")]
    pub campaign_id: ObjectId,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(default)]
    pub flagged: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime,
}

impl Donation {
    /// Amount in the gateway's minor unit (kobo/pesewas). Derived, never stored.
    pub fn amount_minor(&self) -> i64 {
        to_minor_units(self.amount)
    }
}

pub fn to_minor_units(amount_major: f64) -> i64 {
    (amount_major * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_consistently() {
        assert_eq!(to_minor_units(50.0), 5000);
        assert_eq!(to_minor_units(0.01), 1);
        assert_eq!(to_minor_units(19.99), 1999);
        // sub-cent fractions round half away from zero, same rule on
        // both the create and verify paths
        assert_eq!(to_minor_units(10.005), 1001);
        assert_eq!(to_minor_units(10.004), 1000);
    }

    #[test]
    fn terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Successful.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }
}
