//! HTTP middleware and request extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID (recorded on the span, tagged in Sentry)
//! 4. CORS
//! 5. Security headers

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    AdminOnly, AuthUser, Customer, Moderation, OptionalAuth, Reporting, RequireAuth,
    RequireCustomer, RequireStaff, StaffMember, SupportDesk,
};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
