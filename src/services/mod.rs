pub mod transit_api;
