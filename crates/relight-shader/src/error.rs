use thiserror::Error;

/// Errors raised while building a fragment program.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The generated module failed to parse or validate.
    #[error("shader '{label}' failed to compile: {diagnostic}")]
    Compile {
        /// Program label.
        label: String,
        /// The offending WGSL source.
        wgsl: String,
        /// naga's rendered diagnostic.
        diagnostic: String,
    },

    /// The program description is inconsistent.
    #[error("invalid program '{label}': {reason}")]
    InvalidSpec {
        /// Program label.
        label: String,
        /// What is wrong.
        reason: String,
    },
}
