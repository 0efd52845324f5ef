//! The I/O-layer error taxonomy: IO, Malformed, Protocol, Limit.
//!
//! Resolution and Loop are *results*, not errors (see `gds-validate`), so
//! they have no variant here.

#[derive(Debug, thiserror::Error)]
pub enum GdsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record at offset {offset}: {message}")]
    Malformed { offset: u64, message: String },

    #[error("protocol violation at offset {offset}: {message}")]
    Protocol { offset: u64, message: String },

    #[error("{field} exceeds limit: {detail}")]
    Limit { field: &'static str, detail: String },
}

impl GdsError {
    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        GdsError::Malformed { offset, message: message.into() }
    }

    pub fn protocol(offset: u64, message: impl Into<String>) -> Self {
        GdsError::Protocol { offset, message: message.into() }
    }

    pub fn limit(field: &'static str, detail: impl Into<String>) -> Self {
        GdsError::Limit { field, detail: detail.into() }
    }
}
