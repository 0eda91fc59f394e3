pub mod accounts;
pub mod api;
pub mod bookmarks;
pub mod bootstrap;
pub mod communities;
pub mod config;
pub mod consistency;
pub mod database;
pub mod error;
pub mod listings;
pub mod posts;
pub mod seed;
pub mod subscriptions;
pub mod telemetry;
pub mod utils;
pub mod votes;

#[cfg(test)]
mod test_support;
