//! autopurge: watches one Telegram chat and deletes its messages once they
//! outlive the configured retention period.

pub mod channels;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod index;
pub mod ingest;
pub mod policy;
pub mod store;
pub mod sweep;
