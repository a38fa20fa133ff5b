pub mod calendar;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod http;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod rate_limit;
pub mod tenant;
pub mod wal;
