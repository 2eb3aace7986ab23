// handlers/campaign_handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Collection,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::models::campaign::Campaign;
use crate::models::user::Claims;
use crate::services::campaign_aggregator::{
    sort_coming_to_end, sort_most_popular, CampaignAggregator,
};
use crate::services::donation_store::{DonationStore, MongoDonationStore};
use crate::state::AppState;

fn aggregator(state: &AppState) -> CampaignAggregator {
    CampaignAggregator::new(&state.db, Arc::new(MongoDonationStore::new(&state.db)))
}

fn envelope(success: u8, message: &str, key: &str, value: Value) -> Json<Value> {
    let mut data = serde_json::Map::new();
    data.insert("success".to_string(), json!(success));
    data.insert("message".to_string(), json!(message));
    data.insert(key.to_string(), value);
    data.insert("error".to_string(), json!(if success == 1 { 0 } else { 1 }));
    Json(json!({ "data": data }))
}

async fn fetch_campaigns(
    collection: &Collection<Campaign>,
    filter: mongodb::bson::Document,
) -> crate::errors::Result<Vec<Campaign>> {
    let cursor = collection.find(filter).await?;
    Ok(cursor.try_collect().await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignListQuery {
    #[serde(rename = "campaignId")]
    pub campaign_id: Option<String>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
}

/// Base listing filter plus the optional id narrowings from the query.
fn campaign_list_filter(query: &CampaignListQuery) -> Result<Document, &'static str> {
    let mut filter = doc! {
        "status": "Publish",
        "campaign_status": { "$in": ["Running", "Upcoming"] },
    };
    if let Some(id) = query.campaign_id.as_deref() {
        let id = ObjectId::parse_str(id).map_err(|_| "Invalid campaign id")?;
        filter.insert("_id", id);
    }
    if let Some(id) = query.category_id.as_deref() {
        let id = ObjectId::parse_str(id).map_err(|_| "Invalid category id")?;
        filter.insert("categoryId", id);
    }
    Ok(filter)
}

// GET /api/campaigns - published Running/Upcoming campaigns, optionally
// narrowed to one campaign or one category
pub async fn get_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignListQuery>,
) -> impl IntoResponse {
    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let filter = match campaign_list_filter(&query) {
        Ok(filter) => filter,
        Err(message) => {
            return (
                StatusCode::OK,
                envelope(0, message, "campaigns", json!([])),
            );
        }
    };

    let campaigns = match fetch_campaigns(&collection, filter).await {
        Ok(campaigns) => campaigns,
        Err(e) => {
            error!("Error during get all campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            );
        }
    };

    if campaigns.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "no project found", "campaigns", json!([])),
        );
    }

    match aggregator(&state).enrich_many(campaigns).await {
        Ok(views) => (
            StatusCode::OK,
            envelope(1, "Campaign Found", "campaigns", json!(views)),
        ),
        Err(e) => {
            error!("Error during get all campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            )
        }
    }
}

// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(campaign_id) = ObjectId::parse_str(&id) else {
        return (
            StatusCode::OK,
            envelope(0, "Invalid campaign id", "campaign", Value::Null),
        );
    };

    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let campaign = match collection
        .find_one(doc! { "_id": campaign_id, "status": "Publish" })
        .await
    {
        Ok(Some(campaign)) => campaign,
        Ok(None) => {
            return (
                StatusCode::OK,
                envelope(0, "no project found", "campaign", Value::Null),
            )
        }
        Err(e) => {
            error!("Error during get campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaign", Value::Null),
            );
        }
    };

    match aggregator(&state).enrich(campaign).await {
        Ok(view) => (
            StatusCode::OK,
            envelope(1, "Campaign Found", "campaign", json!(view)),
        ),
        Err(e) => {
            error!("Error during get campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaign", Value::Null),
            )
        }
    }
}

// GET /api/campaigns/popular - running campaigns by total raised, descending
pub async fn most_popular_campaigns(State(state): State<AppState>) -> impl IntoResponse {
    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let filter = doc! { "status": "Publish", "campaign_status": "Running" };

    let campaigns = match fetch_campaigns(&collection, filter).await {
        Ok(campaigns) => campaigns,
        Err(e) => {
            error!("Error during most popular campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            );
        }
    };

    if campaigns.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "no running project found", "campaigns", json!([])),
        );
    }

    match aggregator(&state).enrich_many(campaigns).await {
        Ok(mut views) => {
            sort_most_popular(&mut views);
            (
                StatusCode::OK,
                envelope(1, "Most popular campaigns found", "campaigns", json!(views)),
            )
        }
        Err(e) => {
            error!("Error during most popular campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            )
        }
    }
}

// GET /api/campaigns/coming-to-end - running campaigns by urgency
pub async fn coming_to_end_campaigns(State(state): State<AppState>) -> impl IntoResponse {
    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let filter = doc! { "status": "Publish", "campaign_status": "Running" };

    let campaigns = match fetch_campaigns(&collection, filter).await {
        Ok(campaigns) => campaigns,
        Err(e) => {
            error!("Error during coming to end campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            );
        }
    };

    if campaigns.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "no running project found", "campaigns", json!([])),
        );
    }

    match aggregator(&state).enrich_many(campaigns).await {
        Ok(mut views) => {
            sort_coming_to_end(&mut views);
            (
                StatusCode::OK,
                envelope(1, "coming to end campaign Found", "campaigns", json!(views)),
            )
        }
        Err(e) => {
            error!("Error during coming to end campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            )
        }
    }
}

// GET /api/campaigns/upcoming
pub async fn upcoming_campaigns(State(state): State<AppState>) -> impl IntoResponse {
    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let filter = doc! { "status": "Publish", "campaign_status": "Upcoming" };

    let campaigns = match fetch_campaigns(&collection, filter).await {
        Ok(campaigns) => campaigns,
        Err(e) => {
            error!("Error during get all upcoming projects: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            );
        }
    };

    if campaigns.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "no upcoming project found", "campaigns", json!([])),
        );
    }

    match aggregator(&state).enrich_many(campaigns).await {
        Ok(views) => (
            StatusCode::OK,
            envelope(1, "upcoming project found", "campaigns", json!(views)),
        ),
        Err(e) => {
            error!("Error during get all upcoming projects: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "campaigns", json!([])),
            )
        }
    }
}

// GET /api/donations/me - the donor's own payment history
pub async fn my_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    let Ok(user_id) = ObjectId::parse_str(&claims.sub) else {
        return (
            StatusCode::OK,
            envelope(0, "Invalid user id", "donations", json!([])),
        );
    };

    let store = MongoDonationStore::new(&state.db);
    let donations = match store.find_by_user(user_id).await {
        Ok(donations) => donations,
        Err(e) => {
            error!("Error during get user donation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(0, "An error occurred", "donations", json!([])),
            );
        }
    };

    if donations.is_empty() {
        return (
            StatusCode::OK,
            envelope(0, "no donation found", "donations", json!([])),
        );
    }

    // Join campaign names/images for display.
    let campaign_ids: Vec<ObjectId> = donations.iter().map(|d| d.campaign_id).collect();
    let collection: Collection<Campaign> = state.db.collection("campaigns");
    let campaigns: HashMap<ObjectId, Campaign> =
        match fetch_campaigns(&collection, doc! { "_id": { "$in": campaign_ids } }).await {
            Ok(campaigns) => campaigns
                .into_iter()
                .filter_map(|c| c.id.map(|id| (id, c)))
                .collect(),
            Err(e) => {
                error!("Error during get user donation: {}", e);
                HashMap::new()
            }
        };

    let items: Vec<Value> = donations
        .iter()
        .map(|d| {
            let campaign = campaigns.get(&d.campaign_id);
            json!({
                "_id": d.id.map(|id| id.to_hex()),
                "date": d.date,
                "amount": d.amount,
                "currency": d.currency,
                "payment_method": d.payment_method,
                "transaction_id": d.transaction_id,
                "payment_status": d.payment_status,
                "campaign": campaign.map(|c| json!({
                    "_id": c.id.map(|id| id.to_hex()),
                    "name": c.name,
                    "image": c.image,
                })),
            })
        })
        .collect();

    (
        StatusCode::OK,
        envelope(1, "Donation Found", "donations", json!(items)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filter_defaults_to_published_active_campaigns() {
        let filter = campaign_list_filter(&CampaignListQuery::default()).unwrap();
        assert_eq!(filter.get_str("status").unwrap(), "Publish");
        assert!(filter.get_document("campaign_status").is_ok());
        assert!(filter.get("_id").is_none());
        assert!(filter.get("categoryId").is_none());
    }

    #[test]
    fn list_filter_narrows_to_campaign_and_category() {
        let campaign_id = ObjectId::new();
        let category_id = ObjectId::new();
        let query = CampaignListQuery {
            campaign_id: Some(campaign_id.to_hex()),
            category_id: Some(category_id.to_hex()),
        };

        let filter = campaign_list_filter(&query).unwrap();
        assert_eq!(filter.get_object_id("_id").unwrap(), campaign_id);
        assert_eq!(filter.get_object_id("categoryId").unwrap(), category_id);
        assert_eq!(filter.get_str("status").unwrap(), "Publish");
    }

    #[test]
    fn list_filter_rejects_malformed_ids() {
        let query = CampaignListQuery {
            campaign_id: Some("not-an-id".to_string()),
            category_id: None,
        };
        assert_eq!(campaign_list_filter(&query), Err("Invalid campaign id"));

        let query = CampaignListQuery {
            campaign_id: None,
            category_id: Some("xyz".to_string()),
        };
        assert_eq!(campaign_list_filter(&query), Err("Invalid category id"));
    }
}
