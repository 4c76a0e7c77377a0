//! Engine error types.

use thiserror::Error;

/// Errors raised at the accelerated-engine boundary.
///
/// None of these escape `Life::step`; a failed accelerated run is logged and
/// the same generations are computed directly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Accelerated mode requested but no engine is attached.
    #[error("no accelerated engine attached")]
    Unavailable,

    /// The engine reported a failure.
    #[error("accelerated engine failed: {0}")]
    Failed(String),

    /// The engine returned a result the coordinator cannot use.
    #[error("malformed accelerated result: {0}")]
    MalformedResult(&'static str),

    /// An engine mode name that is neither normal nor accelerated.
    #[error("unknown engine mode `{0}`")]
    UnknownMode(String),
}
