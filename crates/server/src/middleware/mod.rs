//! HTTP middleware stack for the gateway.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (any origin; the API is token-authenticated)
//!
//! Bearer-token checks are an extractor ([`RequireAuth`]) rather than a layer,
//! so public routes need no exemption list.

pub mod auth;
pub mod request_id;

pub use auth::{AuthRejection, AuthUser, RequireAuth};
pub use request_id::request_id_middleware;
