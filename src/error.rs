use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for pack operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Unified error type for all pack operations
///
/// Every variant corresponds to exactly one [`ErrorCode`]. Structural damage is
/// reported as [`PackError::Format`], except on entries flagged as obfuscated,
/// where the same symptoms surface as [`PackError::BadPassword`].
#[derive(Debug, Error)]
pub enum PackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid pack format: {0}")]
    Format(String),

    #[error("Unsupported pack version: {0}")]
    Version(u32),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("CRC mismatch: expected {expected:08x}, got {actual:08x}")]
    Crc { expected: u32, actual: u32 },

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Compression failed: {0}")]
    Compress(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Missing or wrong password for obfuscated entry")]
    BadPassword,

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Destination too small: need {needed} bytes, have {available}")]
    NoSpace { needed: u64, available: u64 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PackError {
    /// Flat result code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            PackError::Io(_) => ErrorCode::Io,
            PackError::Format(_) => ErrorCode::Format,
            PackError::Version(_) => ErrorCode::Version,
            PackError::OutOfMemory(_) => ErrorCode::Mem,
            PackError::Crc { .. } => ErrorCode::Crc,
            PackError::NotFound(_) => ErrorCode::NotFound,
            PackError::Compress(_) => ErrorCode::Compress,
            PackError::Decompress(_) => ErrorCode::Decompress,
            PackError::BadPassword => ErrorCode::BadPassword,
            PackError::InvalidArg(_) => ErrorCode::InvalidArg,
            PackError::State(_) => ErrorCode::State,
            PackError::NoSpace { .. } => ErrorCode::NoSpace,
            PackError::NotImplemented(_) => ErrorCode::NotImplemented,
        }
    }
}

/// Closed result-code taxonomy shared by the builder, the reader and the codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    Io,
    Format,
    Version,
    Mem,
    Crc,
    NotFound,
    Compress,
    Decompress,
    BadPassword,
    InvalidArg,
    State,
    NoSpace,
    NotImplemented,
}

impl ErrorCode {
    /// Stable, log-friendly name of the code
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Io => "IO_ERROR",
            ErrorCode::Format => "FORMAT_ERROR",
            ErrorCode::Version => "VERSION_ERROR",
            ErrorCode::Mem => "OUT_OF_MEMORY",
            ErrorCode::Crc => "CRC_MISMATCH",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Compress => "COMPRESS_FAILED",
            ErrorCode::Decompress => "DECOMPRESS_FAILED",
            ErrorCode::BadPassword => "BAD_PASSWORD",
            ErrorCode::InvalidArg => "INVALID_ARGUMENT",
            ErrorCode::State => "INVALID_STATE",
            ErrorCode::NoSpace => "NO_SPACE",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T> From<&Result<T>> for ErrorCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ErrorCode::Ok,
            Err(err) => err.code(),
        }
    }
}

impl From<toml::de::Error> for PackError {
    fn from(err: toml::de::Error) -> Self {
        PackError::InvalidArg(format!("invalid build options: {}", err))
    }
}

impl From<std::collections::TryReserveError> for PackError {
    fn from(err: std::collections::TryReserveError) -> Self {
        PackError::OutOfMemory(err.to_string())
    }
}
