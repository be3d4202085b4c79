pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod gtfs;
pub mod infra;
pub mod output;
pub mod parser;
pub mod raw;
pub mod scrape;
pub mod services;
pub mod stats;
pub mod validate;
