//! Database repositories for the membership portal
//!
//! PostgreSQL implementations of the store traits in [`super::store`].
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with the database.

pub mod attendance;
pub mod refresh_token;
pub mod user;

pub use attendance::{AttendanceRepository, AttendanceRepositoryError};
pub use refresh_token::{RefreshTokenRepository, RefreshTokenRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
