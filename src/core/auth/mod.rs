//! Authentication module for the membership portal
//!
//! This module provides authentication functionality including:
//! - JWT access token generation and validation
//! - Password hashing, policy checks and opaque token generation
//! - Two-phase registration, login and password setting
//! - Single-use refresh tokens kept in a ledger
//! - REST API endpoints and the bearer-token extractor

pub mod api;
pub mod extractor;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use extractor::{AuthenticatedUser, extract_bearer_token};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenPair};
pub use ledger::{IssuedRefreshToken, LedgerError, RefreshTokenLedger};
pub use service::{
    AuthError, AuthService, AuthSettings, CompleteRegisterRequest, LoginRequest, LoginResponse,
    RefreshRequest, RegisterRequest, RegisterResponse, SetPasswordRequest, SetPasswordResponse,
};
