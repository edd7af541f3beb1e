

/// Error messages.
pub mod error;
