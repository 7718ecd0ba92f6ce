pub mod config;
pub mod spending;
pub mod tracing;
