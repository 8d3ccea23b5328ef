pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod diaries;
pub mod error;
pub mod friends;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod paging;
pub mod reactions;
pub mod repo;
pub mod routes;
pub mod session;
pub mod validate;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
