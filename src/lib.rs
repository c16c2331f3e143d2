pub mod actionable;
pub mod alert;
pub mod cache;
pub mod chain;
pub mod client;
pub mod engine;
pub mod expiry;
pub mod model;
pub mod notify;
pub mod render;
pub mod roll;
pub mod store;
pub mod symbol;

pub mod config;
