pub(crate) mod campaign_handlers;
pub(crate) mod payment_handlers;
