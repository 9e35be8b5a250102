//! Error type for IR replay.

use thiserror::Error;

/// Errors raised while replaying the IR into a sink.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A `.lib file entry` call named an entry no parsed library defines.
    #[error("Library entry ({entry}) not available in ({scope})")]
    MissingLibrary { entry: String, scope: String },
}

/// Result type for IR replay.
pub type Result<T> = std::result::Result<T, BuildError>;
