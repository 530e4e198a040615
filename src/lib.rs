#![deny(rust_2018_idioms)]

pub mod archive_registry;
pub mod auth;
pub mod clients;
pub mod config;
pub mod control_store;
pub mod coordinator;
pub mod errors;
pub mod failpoints;
pub mod http_server;
pub mod metrics;
pub mod share;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod versioning;
