//! Error types for the glitch controller

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port could not be opened
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sweep range that never reaches its stop value
    #[error("Invalid sweep range {start} {stop} {step}: {reason}")]
    InvalidRange {
        start: i64,
        stop: i64,
        step: i64,
        reason: &'static str,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
