pub mod campaign;
pub mod category;
pub mod donation;
pub mod user;

use mongodb::bson::oid::ObjectId;
use serde::Serializer;

// Client-facing JSON carries plain hex ids, not extended JSON. Outward
// serialization only; reads from Mongo deserialize the native ObjectId.
pub(crate) fn serialize_object_id_hex<S>(
    id: &Option<ObjectId>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match id {
        Some(id) => serializer.serialize_str(&id.to_hex()),
        None => serializer.serialize_none(),
    }
}
