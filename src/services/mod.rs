pub mod campaign_aggregator;
pub mod donation_store;
pub mod paystack;
pub mod reconciliation;
pub mod webhook_auth;
