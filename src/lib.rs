//! Idempotent task execution for job requests.
//!
//! A job request is recorded once per set of domain parameters
//! ([`db::JobRepository::get_or_create_fib`]); workers later build the bound
//! [`pipeline::Task`] through the [`pipeline::TaskRegistry`] and run it only
//! if its [`pipeline::Target`] does not exist yet.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod shutdown;
pub mod worker;
