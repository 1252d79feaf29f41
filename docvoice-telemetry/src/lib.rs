//! # docvoice-telemetry
//!
//! Structured logging for the docvoice binaries.
//!
//! Library crates only emit `tracing` events; binaries call [`init_telemetry`]
//! (console) or [`init_with_otlp`] (console plus OTLP span export) once at
//! startup.
//!
//! ```rust
//! use docvoice_telemetry::{init_telemetry, info};
//!
//! init_telemetry("docvoice").expect("telemetry");
//! info!("ready");
//! ```

pub mod init;
pub mod spans;

pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{init_telemetry, init_with_otlp, shutdown_telemetry};
pub use spans::*;
