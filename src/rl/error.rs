use thiserror::Error;

/// Errors raised by function approximators.
#[derive(Debug, Error)]
pub enum ApproximatorError {
    #[error("Weights do not match the network: {0}")]
    ShapeMismatch(String),

    #[error("Missing parameter block: {0}")]
    MissingParameter(String),

    #[error("Batch is empty or ragged")]
    InvalidBatch,

    #[error("Weights I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Weights encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Tensor backend error: {0}")]
    Candle(#[from] candle_core::Error),

    #[cfg(feature = "rl-nn")]
    #[error("Torch backend error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("Approximator backend not available: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_display() {
        let e = ApproximatorError::ShapeMismatch("l1.weight".to_string());
        assert_eq!(e.to_string(), "Weights do not match the network: l1.weight");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: ApproximatorError = io.into();
        assert!(e.to_string().starts_with("Weights I/O failed"));
    }
}
