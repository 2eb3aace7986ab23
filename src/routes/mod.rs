pub mod campaigns;
pub mod payments;
