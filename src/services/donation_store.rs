// services/donation_store.rs
//
// Durable CRUD for donation records. All status writes go through
// `finalize`, which conditions the update on the record still being
// Pending; that conditional update is the single serialization point
// between the verify and webhook paths.
use async_trait::async_trait;
use chrono::Duration;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    options::ReturnDocument,
    Collection, Database,
};

use crate::errors::{AppError, Result};
use crate::models::donation::{Donation, PaymentStatus};

#[async_trait]
pub trait DonationStore: Send + Sync {
    /// Persists a new Pending donation. `DuplicateReference` if the
    /// transaction_id already exists.
    async fn create_pending(&self, donation: Donation) -> Result<Donation>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>>;

    /// One-way transition Pending -> {Successful, Failed}. Atomic
    /// check-and-set: if the record is already terminal this is a no-op
    /// that returns the stored record unchanged.
    async fn finalize(
        &self,
        id: ObjectId,
        outcome: PaymentStatus,
        reason: &str,
        flagged: bool,
    ) -> Result<Donation>;

    /// Request-level idempotency: a Pending donation for the same donor,
    /// campaign, amount, currency and method created within `within`.
    async fn find_pending_match(
        &self,
        user_id: ObjectId,
        campaign_id: ObjectId,
        amount: f64,
        currency: &str,
        method: &str,
        within: Duration,
    ) -> Result<Option<Donation>>;

    async fn find_by_campaign(&self, campaign_id: ObjectId) -> Result<Vec<Donation>>;

    async fn find_by_user(&self, user_id: ObjectId) -> Result<Vec<Donation>>;
}

#[derive(Clone)]
pub struct MongoDonationStore {
    collection: Collection<Donation>,
}

impl MongoDonationStore {
    pub fn new(db: &Database) -> Self {
        MongoDonationStore {
            collection: db.collection("donations"),
        }
    }
}

#[async_trait]
impl DonationStore for MongoDonationStore {
    async fn create_pending(&self, donation: Donation) -> Result<Donation> {
        match self.collection.insert_one(&donation).await {
            Ok(_) => Ok(donation),
            Err(e) if AppError::is_duplicate_key(&e) => {
                Err(AppError::DuplicateReference(donation.transaction_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>> {
        Ok(self
            .collection
            .find_one(doc! { "transaction_id": reference })
            .await?)
    }

    async fn finalize(
        &self,
        id: ObjectId,
        outcome: PaymentStatus,
        reason: &str,
        flagged: bool,
    ) -> Result<Donation> {
        debug_assert!(outcome.is_terminal());

        let filter = doc! {
            "_id": id,
            "payment_status": PaymentStatus::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "payment_status": outcome.as_str(),
                "failure_reason": reason,
                "flagged": flagged,
                "updatedAt": DateTime::now(),
            }
        };

        let updated = self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(donation) => Ok(donation),
            // Lost the race or already terminal: hand back the record as-is.
            None => self
                .collection
                .find_one(doc! { "_id": id })
                .await?
                .ok_or(AppError::DonationNotFound),
        }
    }

    async fn find_pending_match(
        &self,
        user_id: ObjectId,
        campaign_id: ObjectId,
        amount: f64,
        currency: &str,
        method: &str,
        within: Duration,
    ) -> Result<Option<Donation>> {
        let cutoff =
            DateTime::from_millis(DateTime::now().timestamp_millis() - within.num_milliseconds());

        let filter = doc! {
            "userId": user_id,
            "campaignId": campaign_id,
            "amount": amount,
            "currency": currency,
            "payment_method": method,
            "payment_status": PaymentStatus::Pending.as_str(),
            "createdAt": { "$gte": cutoff },
        };

        Ok(self.collection.find_one(filter).await?)
    }

    async fn find_by_campaign(&self, campaign_id: ObjectId) -> Result<Vec<Donation>> {
        let cursor = self
            .collection
            .find(doc! { "campaignId": campaign_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_user(&self, user_id: ObjectId) -> Result<Vec<Donation>> {
        let cursor = self
            .collection
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

/// In-memory store used by unit tests. The single mutex makes the
/// finalize check-and-set atomic, matching the Mongo conditional update.
#[cfg(test)]
pub mod memory {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryDonationStore {
        pub donations: Mutex<Vec<Donation>>,
    }

    #[async_trait]
    impl DonationStore for MemoryDonationStore {
        async fn create_pending(&self, donation: Donation) -> Result<Donation> {
            let mut donations = self.donations.lock().await;
            if donations
                .iter()
                .any(|d| d.transaction_id == donation.transaction_id)
            {
                return Err(AppError::DuplicateReference(donation.transaction_id));
            }
            donations.push(donation.clone());
            Ok(donation)
        }

        async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>> {
            let donations = self.donations.lock().await;
            Ok(donations
                .iter()
                .find(|d| d.transaction_id == reference)
                .cloned())
        }

        async fn finalize(
            &self,
            id: ObjectId,
            outcome: PaymentStatus,
            reason: &str,
            flagged: bool,
        ) -> Result<Donation> {
            let mut donations = self.donations.lock().await;
            let donation = donations
                .iter_mut()
                .find(|d| d.id == Some(id))
                .ok_or(AppError::DonationNotFound)?;
            if donation.payment_status == PaymentStatus::Pending {
                donation.payment_status = outcome;
                donation.failure_reason = reason.to_string();
                donation.flagged = flagged;
                donation.updated_at = DateTime::now();
            }
            Ok(donation.clone())
        }

        async fn find_pending_match(
            &self,
            user_id: ObjectId,
            campaign_id: ObjectId,
            amount: f64,
            currency: &str,
            method: &str,
            within: Duration,
        ) -> Result<Option<Donation>> {
            let cutoff = DateTime::now().timestamp_millis() - within.num_milliseconds();
            let donations = self.donations.lock().await;
            Ok(donations
                .iter()
                .find(|d| {
                    d.user_id == Some(user_id)
                        && d.campaign_id == campaign_id
                        && d.amount == amount
                        && d.currency == currency
                        && d.payment_method == method
                        && d.payment_status == PaymentStatus::Pending
                        && d.created_at.timestamp_millis() >= cutoff
                })
                .cloned())
        }

        async fn find_by_campaign(&self, campaign_id: ObjectId) -> Result<Vec<Donation>> {
            let donations = self.donations.lock().await;
            Ok(donations
                .iter()
                .filter(|d| d.campaign_id == campaign_id)
                .cloned()
                .collect())
        }

        async fn find_by_user(&self, user_id: ObjectId) -> Result<Vec<Donation>> {
            let donations = self.donations.lock().await;
            Ok(donations
                .iter()
                .filter(|d| d.user_id == Some(user_id))
                .cloned()
                .collect())
        }
    }
}
