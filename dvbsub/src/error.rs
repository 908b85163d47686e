//! Error types for the decoder boundary.

use thiserror::Error;

/// Errors returned across the decoder's public API.
///
/// Malformed data inside a segment never surfaces here; it is skipped and
/// reported through [`crate::callback::SubtitleCallbacks::report_error`].
#[derive(Error, Debug)]
pub enum DecoderError {
    /// The PES envelope of a submitted packet could not be used at all.
    #[error("PES packet rejected: {0}")]
    Protocol(#[from] dvbsub_protocol::ProtocolError),

    /// A parameter at the component boundary is invalid.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The scheduler task is already running.
    #[error("Decoder already started")]
    AlreadyStarted,
}

/// Result alias for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;
