use mongodb::bson::{oid::ObjectId, serde_helpers, DateTime};
use serde::{Deserialize, Serialize};

use crate::models::category::Category;

/// Cached derived lifecycle field; recomputed lazily on read and corrected
/// in place when stale. The stored value is never trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Upcoming,
    Running,
    Ended,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Upcoming => "Upcoming",
            CampaignStatus::Running => "Running",
            CampaignStatus::Ended => "Ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishStatus {
    Publish,
    UnPublish,
}

// Serialization is outward-facing only (the client wants hex ids and
// RFC 3339 timestamps); campaigns are never written back through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(
        rename = "_id",
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::serialize_object_id_hex"
    )]
    pub id: Option<ObjectId>,
    pub image: String,
    pub name: String,
    // Raw reference; the view replaces it with the joined category.
    #[serde(rename = "categoryId", skip_serializing)]
    pub category_id: ObjectId,
    // calendar dates, "YYYY-MM-DD"
    pub starting_date: String,
    pub ending_date: String,
    #[serde(default)]
    pub campaign_amount: f64,
    pub organizer_image: String,
    pub organizer_name: String,
    #[serde(default)]
    pub gallery: Vec<String>,
    pub description: String,
    pub campaign_status: CampaignStatus,
    pub status: PublishStatus,
    #[serde(
        rename = "createdAt",
        serialize_with = "serde_helpers::serialize_bson_datetime_as_rfc3339_string"
    )]
    pub created_at: DateTime,
    #[serde(
        rename = "updatedAt",
        serialize_with = "serde_helpers::serialize_bson_datetime_as_rfc3339_string"
    )]
    pub updated_at: DateTime,
}

/// Campaign enriched with live donation aggregates, as served to the
/// mobile client. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    /// Joined category, `{ _id, image, name }`, under the key the raw
    /// reference would have occupied. Null when the category is gone.
    #[serde(rename = "categoryId")]
    pub category: Option<Category>,
    #[serde(rename = "totalDonationAmount")]
    pub total_donation_amount: f64,
    #[serde(rename = "remainingAmount")]
    pub remaining_amount: f64,
    #[serde(rename = "totalDonors")]
    pub total_donors: usize,
    #[serde(rename = "remainingTime")]
    pub remaining_time: String,
}
