use thiserror::Error;

pub type Result<T> = std::result::Result<T, SquareError>;

/// Canonical error type exposed by the square primitives.
///
/// The first four variants are the per-transaction and per-block outcomes of
/// square preparation; the rest are plumbing failures.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SquareError {
    /// Unparseable envelope, reserved namespace or inconsistent declared
    /// length. Drops one transaction.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// No candidate commitment matches the recomputed one at the chosen size.
    #[error("commitment mismatch at square size {square_size}")]
    CommitmentMismatch { square_size: u64 },

    /// The content does not fit the largest supported square.
    #[error("no supported square size fits {required} (limit {limit})")]
    NoFittingSquareSize { required: usize, limit: usize },

    /// A sequence declares more bytes than its shares can physically carry.
    #[error("sequence length {declared} exceeds share capacity {available}")]
    DecodeOverflow { declared: usize, available: usize },

    /// Rejected configuration values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Structurally invalid share bytes on the read path.
    #[error("invalid share: {0}")]
    InvalidShare(&'static str),

    /// Namespace of the wrong size or out of order.
    #[error("namespace error: {0}")]
    Namespace(&'static str),

    /// Namespaced merkle tree misuse.
    #[error("merkle error: {0}")]
    Merkle(String),

    /// Reed–Solomon erasure coding failure.
    #[error("reed-solomon error: {0}")]
    ReedSolomon(#[from] reed_solomon_erasure::Error),
}

impl From<bincode::Error> for SquareError {
    fn from(err: bincode::Error) -> Self {
        SquareError::MalformedTransaction(err.to_string())
    }
}
