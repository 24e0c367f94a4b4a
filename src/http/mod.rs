//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (standard or embedded listener)
//!     → server.rs (Axum setup, middleware, graceful drain)
//!     → request.rs (assign and propagate request ID)
//!     → handlers.rs (health, user, products)
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```
//!
//! Anything outside the API routes is served from the static directory.

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorBody};
pub use server::{AppState, HttpServer};
