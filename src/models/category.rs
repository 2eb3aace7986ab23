use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Campaign category, joined into campaign responses as
/// `{ _id, image, name }`. Other stored fields are ignored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(
        rename = "_id",
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::serialize_object_id_hex"
    )]
    pub id: Option<ObjectId>,
    pub image: String,
    pub name: String,
}
