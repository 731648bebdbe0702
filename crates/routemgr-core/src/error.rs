/// Errors raised while validating configuration and wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid ledger address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid liquidity curve: {0}")]
    InvalidCurve(String),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
