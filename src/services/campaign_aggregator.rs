// services/campaign_aggregator.rs
//
// Enriches campaigns with live donation aggregates and corrects the
// cached `campaign_status` field lazily on read. The derivations are
// pure functions of (dates, now) so they stay deterministic under test.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::{future::try_join_all, TryStreamExt};
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::ReturnDocument,
    Collection, Database,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{AppError, Result};
use crate::models::campaign::{Campaign, CampaignStatus, CampaignView};
use crate::models::category::Category;
use crate::models::donation::Donation;
use crate::services::donation_store::DonationStore;

pub struct CampaignAggregator {
    campaigns: Collection<Campaign>,
    categories: Collection<Category>,
    store: Arc<dyn DonationStore>,
}

impl CampaignAggregator {
    pub fn new(db: &Database, store: Arc<dyn DonationStore>) -> Self {
        CampaignAggregator {
            campaigns: db.collection("campaigns"),
            categories: db.collection("categories"),
            store,
        }
    }

    pub async fn enrich_many(&self, campaigns: Vec<Campaign>) -> Result<Vec<CampaignView>> {
        let now = Utc::now();
        let categories = self.load_categories(&campaigns).await?;
        try_join_all(campaigns.into_iter().map(|c| {
            let category = categories.get(&c.category_id).cloned();
            self.enrich_one(c, category, now)
        }))
        .await
    }

    pub async fn enrich(&self, campaign: Campaign) -> Result<CampaignView> {
        let category = self
            .categories
            .find_one(doc! { "_id": campaign.category_id })
            .await?;
        self.enrich_one(campaign, category, Utc::now()).await
    }

    /// One `$in` fetch for the category join, keyed for lookup.
    async fn load_categories(
        &self,
        campaigns: &[Campaign],
    ) -> Result<HashMap<ObjectId, Category>> {
        let mut ids: Vec<ObjectId> = campaigns.iter().map(|c| c.category_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let cursor = self.categories.find(doc! { "_id": { "$in": ids } }).await?;
        let categories: Vec<Category> = cursor.try_collect().await?;
        Ok(categories
            .into_iter()
            .filter_map(|c| c.id.map(|id| (id, c)))
            .collect())
    }

    async fn enrich_one(
        &self,
        mut campaign: Campaign,
        category: Option<Category>,
        now: DateTime<Utc>,
    ) -> Result<CampaignView> {
        let id = campaign.id.ok_or(AppError::CampaignNotFound)?;

        let donations = self.store.find_by_campaign(id).await?;
        // Totals count every donation record regardless of payment_status,
        // Pending and Failed included.
        let (total_donation_amount, total_donors) = donation_totals(&donations);
        let remaining_amount = (campaign.campaign_amount - total_donation_amount).max(0.0);

        let start = parse_date(&campaign.starting_date)?;
        let end = parse_date(&campaign.ending_date)?;
        let local_now = now.naive_utc();

        let remaining_time = remaining_time(start, end, local_now);
        let new_status = derive_status(start, end, local_now.date());

        if new_status != campaign.campaign_status {
            let refreshed = self
                .campaigns
                .find_one_and_update(
                    doc! { "_id": id },
                    doc! { "$set": { "campaign_status": new_status.as_str() } },
                )
                .return_document(ReturnDocument::After)
                .await?;
            match refreshed {
                Some(c) => campaign = c,
                None => campaign.campaign_status = new_status,
            }
        }

        // Display-only: the primary image leads the gallery, never persisted.
        if !campaign.image.is_empty() && !campaign.gallery.contains(&campaign.image) {
            campaign.gallery.insert(0, campaign.image.clone());
        }

        Ok(CampaignView {
            campaign,
            category,
            total_donation_amount,
            remaining_amount,
            total_donors,
            remaining_time,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::invalid_data(format!("bad campaign date '{}': {}", value, e)))
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

/// Canonical lifecycle rule. Pure in (start, end, today).
pub fn derive_status(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> CampaignStatus {
    if end < today {
        CampaignStatus::Ended
    } else if start > today {
        CampaignStatus::Upcoming
    } else {
        CampaignStatus::Running
    }
}

/// Human-readable countdown, in priority order: ended, upcoming,
/// ending today (whole hours until end of day), days left.
pub fn remaining_time(start: NaiveDate, end: NaiveDate, now: NaiveDateTime) -> String {
    let today = now.date();
    let days_until_start = (start - today).num_days();
    let days_until_end = (end - today).num_days();

    if days_until_end < 0 {
        "Campaign ended".to_string()
    } else if days_until_start > 0 {
        format!("Upcoming in {} days", days_until_start)
    } else if days_until_end == 0 {
        let remaining_hours = (end_of_day(end) - now).num_hours();
        if remaining_hours <= 0 {
            "Campaign ended".to_string()
        } else {
            format!("{} hours left", remaining_hours)
        }
    } else {
        format!("{} days left", days_until_end)
    }
}

pub fn donation_totals(donations: &[Donation]) -> (f64, usize) {
    let total: f64 = donations.iter().map(|d| d.amount).sum();
    (total, donations.len())
}

/// "Most popular" = descending total raised.
pub fn sort_most_popular(views: &mut [CampaignView]) {
    views.sort_by(|a, b| {
        b.total_donation_amount
            .partial_cmp(&a.total_donation_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Urgency key for "coming to end": hours-left sorts before days-left,
/// which sorts before upcoming; ties break on the leading number.
pub fn coming_to_end_sort_key(remaining_time: &str) -> (u8, i64) {
    let class = if remaining_time.contains("hours left") {
        0
    } else if remaining_time.contains("days left") {
        1
    } else if remaining_time.contains("Upcoming in") {
        2
    } else {
        3
    };
    let number = remaining_time
        .split_whitespace()
        .find_map(|token| token.parse::<i64>().ok())
        .unwrap_or(0);
    (class, number)
}

pub fn sort_coming_to_end(views: &mut [CampaignView]) {
    views.sort_by_key(|v| coming_to_end_sort_key(&v.remaining_time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};

    use crate::models::donation::PaymentStatus;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn donation(amount: f64, status: PaymentStatus) -> Donation {
        Donation {
            id: Some(ObjectId::new()),
            date: "2026-08-01".to_string(),
            user_id: Some(ObjectId::new()),
            campaign_id: ObjectId::new(),
            amount,
            currency: "GHS".to_string(),
            payment_method: "Paystack".to_string(),
            transaction_id: ObjectId::new().to_hex(),
            payment_status: status,
            failure_reason: String::new(),
            flagged: false,
            created_at: BsonDateTime::now(),
            updated_at: BsonDateTime::now(),
        }
    }

    #[test]
    fn status_derivation_is_deterministic() {
        let today = date("2026-08-15");
        for _ in 0..3 {
            assert_eq!(
                derive_status(date("2026-08-01"), date("2026-08-10"), today),
                CampaignStatus::Ended
            );
            assert_eq!(
                derive_status(date("2026-08-20"), date("2026-09-01"), today),
                CampaignStatus::Upcoming
            );
            assert_eq!(
                derive_status(date("2026-08-01"), date("2026-09-01"), today),
                CampaignStatus::Running
            );
        }
    }

    #[test]
    fn status_boundaries() {
        let today = date("2026-08-15");
        // ends today: still running
        assert_eq!(
            derive_status(date("2026-08-01"), today, today),
            CampaignStatus::Running
        );
        // starts today: running
        assert_eq!(
            derive_status(today, date("2026-09-01"), today),
            CampaignStatus::Running
        );
    }

    #[test]
    fn remaining_time_ended() {
        assert_eq!(
            remaining_time(
                date("2026-08-01"),
                date("2026-08-10"),
                at("2026-08-15 12:00:00")
            ),
            "Campaign ended"
        );
    }

    #[test]
    fn remaining_time_upcoming() {
        assert_eq!(
            remaining_time(
                date("2026-08-20"),
                date("2026-09-01"),
                at("2026-08-15 12:00:00")
            ),
            "Upcoming in 5 days"
        );
    }

    #[test]
    fn remaining_time_ending_today_counts_hours() {
        assert_eq!(
            remaining_time(
                date("2026-08-01"),
                date("2026-08-15"),
                at("2026-08-15 18:30:00")
            ),
            "5 hours left"
        );
        // past end of day within the same date
        assert_eq!(
            remaining_time(
                date("2026-08-01"),
                date("2026-08-15"),
                at("2026-08-15 23:59:59")
            ),
            "Campaign ended"
        );
    }

    #[test]
    fn remaining_time_days_left() {
        assert_eq!(
            remaining_time(
                date("2026-08-01"),
                date("2026-08-20"),
                at("2026-08-15 12:00:00")
            ),
            "5 days left"
        );
    }

    #[test]
    fn totals_count_every_record_regardless_of_status() {
        let donations = vec![
            donation(100.0, PaymentStatus::Successful),
            donation(250.0, PaymentStatus::Pending),
            donation(250.0, PaymentStatus::Failed),
        ];
        let (total, donors) = donation_totals(&donations);
        assert_eq!(total, 600.0);
        assert_eq!(donors, 3);
    }

    #[test]
    fn remaining_amount_clamps_at_zero() {
        let (total, _) = donation_totals(&[donation(1500.0, PaymentStatus::Successful)]);
        assert_eq!((1000.0f64 - total).max(0.0), 0.0);
    }

    #[test]
    fn coming_to_end_key_orders_by_urgency_class_then_number() {
        let mut keys = vec![
            coming_to_end_sort_key("Upcoming in 2 days"),
            coming_to_end_sort_key("10 days left"),
            coming_to_end_sort_key("3 hours left"),
            coming_to_end_sort_key("2 days left"),
            coming_to_end_sort_key("12 hours left"),
        ];
        keys.sort();
        assert_eq!(keys, vec![(0, 3), (0, 12), (1, 2), (1, 10), (2, 2)]);
    }
}
