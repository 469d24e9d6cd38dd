pub mod ledger;
pub mod outreach;
