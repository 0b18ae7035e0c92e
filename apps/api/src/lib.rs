pub mod applications;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod intake_client;
pub mod jobs;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
