// Error taxonomy for the advection core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvectionError>;

#[derive(Debug, Error)]
pub enum AdvectionError {
    /// Channel or spatial dimensions disagree between tensors; always an upstream configuration bug
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    /// The grid cannot be normalized (zero extent, unsorted axis, odd longitude count, ...)
    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDecode(#[from] toml::de::Error),

    #[error(transparent)]
    TomlEncode(#[from] toml::ser::Error),
}

impl AdvectionError {
    pub fn shape(what: impl Into<String>, expected: impl ToString, found: impl ToString) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
