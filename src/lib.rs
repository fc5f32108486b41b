pub mod config;
pub mod delivery;
pub mod device;
pub mod health;
pub mod humanize;
pub mod ledger;
pub mod messaging;
pub mod observability;
pub mod reading;
pub mod server;
pub mod worker;
