//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing layer, connect info)
//!     → proxy::Dispatcher (select backend, forward, stream back)
//!     → Send to client
//! ```

pub mod server;

pub use server::{apply_config_update, AppState, HttpServer};
