//! Core domain logic: identity, sessions, attendance and their storage

pub mod attendance;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod pagination;
pub mod qr;
