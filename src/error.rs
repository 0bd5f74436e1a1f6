use crate::core::molecule::BodyId;
use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the collision and reaction kernel.
///
/// Constructors and configuration loading return these; runtime setters driven by a UI
/// report success as a plain `bool` instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Numerical or geometric issue (e.g., coincident centers, non-finite energy).
    #[error("numerical error: {0}")]
    MathError(String),

    /// A body id that is not (or no longer) registered.
    #[error("unknown body: {0}")]
    UnknownBody(BodyId),

    /// Reaction dispatch was handed a pair it was never wired for. Always a bug.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Malformed configuration document.
    #[error("configuration error: {0}")]
    Config(String),

    /// Propagated I/O errors (configuration files).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
