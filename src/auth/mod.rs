//! Authentication module for the door lock server
//!
//! This module handles credential verification, login throttling and
//! lockout, and bearer-token sessions.

pub mod handlers;
mod credentials;
mod rate_limit;
mod service;
mod session;

pub use credentials::{Credential, CredentialStore, Rejection, Role, Verified, OVERRIDE_IDENTITY};
pub use rate_limit::{LockoutState, RateLimitConfig, RateLimiter};
pub use service::AuthService;
pub use session::{Session, SessionConfig, SessionManager};
