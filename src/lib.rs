//! Library crate for reconhub-dash exposing the formatter, paginator, client and server.
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod html;
pub mod paginate;
pub mod search;
pub mod server;
pub mod session;
pub mod types;
pub mod views;
