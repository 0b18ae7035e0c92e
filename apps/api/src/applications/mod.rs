pub mod handlers;
pub mod intake;
pub mod pg_store;
pub mod status;
pub mod store;
pub mod validation;
pub mod workflow;
