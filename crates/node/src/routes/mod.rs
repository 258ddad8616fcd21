pub mod health;
pub mod ledger;
pub mod metrics;
pub mod services;
pub mod transactions;
