//! ScanSphere API library.
//!
//! User registration and login over MySQL, built around a database
//! availability core that keeps the service up while the store is not.

pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod users;

pub use config::AppConfig;
pub use db::Datastore;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
