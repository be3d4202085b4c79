//! Client for the BMTC mobile-app backend.

mod client;

pub use client::BmtcClient;
