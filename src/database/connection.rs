use mongodb::{bson::doc, options::IndexOptions, Client, Database, IndexModel};

use crate::models::donation::Donation;

pub async fn get_db_client(database_url: &str) -> Database {
    let client = Client::with_uri_str(database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = "onepowerdb";
    let db = client.database(db_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("Connected to database: {}", db_name);
            tracing::debug!("Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::error!(
                "Database '{}' may not exist or is inaccessible: {}",
                db_name,
                e
            );
        }
    }

    db
}

/// The unique sparse index on `transaction_id` is the storage-level backstop
/// against reference reuse; the application-level dedup window sits above it.
pub async fn ensure_indexes(db: &Database) {
    let donations = db.collection::<Donation>("donations");
    let index = IndexModel::builder()
        .keys(doc! { "transaction_id": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .sparse(true)
                .build(),
        )
        .build();

    if let Err(e) = donations.create_index(index).await {
        tracing::warn!("Failed to ensure donations.transaction_id index: {}", e);
    }
}
