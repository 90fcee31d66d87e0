//! HTTP surface for the storefront chat widget.

pub mod config;
pub mod render;
pub mod routes;

pub use config::Cli;
pub use render::{escape_html, render};
pub use routes::{router, start, AppState};
