//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection
//!     → server.rs (Axum router, hyper connection, timeouts)
//!     → handlers.rs (/health, /healthz, /metrics)
//!     → proxy.rs (pick backend, dispatch)
//!         → request.rs (director: URI rewrite, forwarding headers)
//!         → client.rs (TCP or Unix socket upstream)
//!         → response.rs + body.rs (relay under the backend deadline)
//!     → Send to client
//! ```

pub mod body;
pub mod client;
pub mod handlers;
pub mod headers;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
