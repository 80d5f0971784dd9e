//! CCI member portal backend
//!
//! Membership registration, JWT sessions with rotating refresh tokens, and
//! once-per-day attendance check-in (manual or by QR code), served over an
//! axum HTTP API backed by PostgreSQL or an in-memory store.

pub mod app;
pub mod core;
