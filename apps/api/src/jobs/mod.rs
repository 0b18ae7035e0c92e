//! Public job listing. Postings are managed elsewhere; this service only
//! reads them and keeps their application counters current.

pub mod handlers;
