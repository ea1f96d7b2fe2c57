//! User accounts.
//!
//! # Responsibilities
//! - Ensure the `users` table exists (schema.rs)
//! - Register, look up and authenticate users (repository.rs)
//! - Hash and verify passwords (password.rs)

pub mod model;
pub mod password;
pub mod repository;
pub mod schema;

pub use model::{NewUser, User};
pub use repository::{UserError, UserRepository};
pub use schema::{TableStatus, UserSchema};
