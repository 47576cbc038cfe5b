//! Library exports for portalauth, shared between the binary and tests.

pub mod auth;
pub mod config;
pub mod guard;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
