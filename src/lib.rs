//! Movie catalogue and review service: a JSON REST API over MongoDB for
//! movies, reviews and per-user watchlists, plus a client-side mirror that
//! keeps list state in sync with the API or a local file.

pub mod app;
pub mod config;
pub mod controllers;
pub mod error;
pub mod extractors;
pub mod metadata;
pub mod mirror;
pub mod models;
pub mod state;
pub mod store;

pub use app::make_app;
