pub mod config;
pub mod connectivity;
pub mod exposition;
pub mod fetcher;
pub mod gauges;
pub mod health;
pub mod responder;
pub mod scheduler;
pub mod transport;
