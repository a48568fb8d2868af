use thiserror::Error;

/// Error taxonomy for the HFS/HFS+/HFSX reader.
///
/// Variants are grouped by how a caller should react: `NotFound` and
/// `NotAvailable` are routine and expected during traversal, `Corruption`
/// marks a subtree as unreliable without poisoning the rest of the volume,
/// and `Aborted` is the cooperative-cancellation signal.
#[derive(Error, Debug)]
pub enum HfsError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("corrupted data: {0}")]
    Corruption(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation aborted")]
    Aborted,

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, HfsError>;

impl HfsError {
    pub fn corruption(msg: impl Into<String>) -> Self {
        HfsError::Corruption(msg.into())
    }
}
