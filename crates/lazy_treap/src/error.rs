use thiserror::Error;

/// Contract violations reported by sequence operations.
///
/// Every error is raised before the sequence is structurally modified, so
/// the sequence is still valid and unchanged after an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreapError {
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("range start {a} is past range end {b}")]
    ReversedRange { a: usize, b: usize },

    #[error("range {start}..{end} out of bounds for sequence of length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("numeric overflow while applying a range delta")]
    NumericOverflow,
}

pub type Result<T> = std::result::Result<T, TreapError>;
