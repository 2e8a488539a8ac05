//! Password-credential service for the claims administration portals:
//! account registration, login and JWT issuance over HTTP.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub use app::build_app;
pub use error::AuthError;
pub use state::AppState;
