//! # Error Types
//!
//! Custom error types for Astro Controller using `thiserror`.
//!
//! [`AstroError`] covers startup failures (configuration, I/O, transport setup).
//! [`LinkFault`] covers everything that can go wrong with a controller link at
//! runtime. Link faults are never returned across the controller boundary; they
//! are logged, reflected in the connection state and kept as the controller's
//! most recent fault.

use thiserror::Error;

use crate::transport::UnitSlot;

/// Main error type for Astro Controller
#[derive(Debug, Error)]
pub enum AstroError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport setup errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias for Astro Controller
pub type Result<T> = std::result::Result<T, AstroError>;

/// Non-fatal controller link faults.
///
/// Every variant resolves to "this logical controller (or unit) is
/// disconnected, keep polling for a future attach".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkFault {
    /// Attach rejected by the allow-list
    #[error("unauthorized device {device} on {slot} unit")]
    UnauthorizedDevice { slot: UnitSlot, device: String },

    /// No fresh input within the staleness window, or too many bad reports
    #[error("critical fault on {slot} unit: {reason}")]
    CriticalFault { slot: UnitSlot, reason: String },

    /// Navigation pair input suggests crossed or duplicated units
    #[error("ambiguous pairing: {0}")]
    AmbiguousPairing(String),

    /// Hardware layer could not be polled
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}
