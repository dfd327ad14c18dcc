pub mod cache;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod selection;
pub mod session;
pub mod state_store;
pub mod store;
pub mod tui;
