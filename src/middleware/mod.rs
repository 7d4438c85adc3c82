//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT) and permission checks
//! - Rate limiting
//! - Security headers

pub mod auth;
pub mod rate_limit;
pub mod security_headers;

pub use auth::{auth_middleware, create_access_token, validate_token, AuthError, AuthUser, Claims};
pub use rate_limit::{login_rate_limit_config, rate_limit_middleware, RateLimitState};
pub use security_headers::{api_cache_control_middleware, security_headers_middleware};
