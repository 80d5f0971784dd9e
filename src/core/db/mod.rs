//! Database module for the membership portal
//!
//! This module provides database connectivity, models, the store traits the
//! services depend on, and their PostgreSQL and in-memory implementations.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use memory::MemoryStore;
pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations, health_check};
pub use repositories::{
    AttendanceRepository, AttendanceRepositoryError, RefreshTokenRepository,
    RefreshTokenRepositoryError, UserRepository, UserRepositoryError,
};
pub use store::{AttendanceStore, DayCounts, RefreshTokenStore, Stores, UserStore};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;

use std::sync::Arc;

/// Build the PostgreSQL-backed store bundle
pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        users: Arc::new(UserRepository::new(pool.clone())),
        refresh_tokens: Arc::new(RefreshTokenRepository::new(pool.clone())),
        attendance: Arc::new(AttendanceRepository::new(pool)),
    }
}
