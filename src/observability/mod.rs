//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!
//! Consumers:
//!     → logging.rs subscriber (text or JSON on stdout)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; the binary installs the subscriber
//! - RUST_LOG overrides the configured level

pub mod logging;

pub use logging::init_logging;
