pub mod api;
pub mod config;
pub mod db;
pub mod market;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod signal;
pub mod store;

pub mod error;
pub mod time;
