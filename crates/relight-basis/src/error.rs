//! Errors raised while interpreting dataset metadata.

/// Errors produced while parsing `info.json` or decoding a basis tensor.
///
/// All of them mean the dataset description cannot be used; the viewer
/// stops loading that source.
#[derive(Debug, thiserror::Error)]
pub enum BasisError {
    /// The document is not valid JSON or does not match the expected shape.
    #[error("malformed info.json: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required by the declared basis type is absent.
    #[error("info.json is missing `{0}`")]
    MissingField(&'static str),

    /// A field is present but unusable.
    #[error("invalid `{field}` in info.json: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// The basis tensor does not have `materials * (planes + 1) * dims * 3` bytes.
    #[error("basis tensor has {actual} bytes, expected {expected}")]
    BlobSize {
        /// Size implied by the metadata.
        expected: usize,
        /// Size received.
        actual: usize,
    },

    /// Light weights were requested before the basis tensor arrived.
    #[error("basis tensor not loaded")]
    BasisNotLoaded,
}
