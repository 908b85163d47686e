//! Caller-facing capability traits.
//!
//! Output delivery is callback-based and crosses threads: `show` and
//! `report_error` may be invoked from the scheduler thread. Callers that
//! need main-thread delivery must marshal the calls themselves.

use std::sync::Arc;

use crate::compose::Picture;

/// Recoverable condition classes reported through [`SubtitleCallbacks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported wire data was skipped.
    InvalidData,
    /// The video clock is unusable or far away from a picture's timestamp.
    Time,
}

/// Callbacks through which decoded output leaves the decoder.
///
/// All methods have no-op defaults except `show`, which is the point of
/// the exercise.
pub trait SubtitleCallbacks: Send + Sync {
    /// A picture should be put on screen, or taken off it (`None`).
    ///
    /// Invoked from the scheduler thread.
    fn show(&self, picture: Option<Arc<Picture>>);

    /// A recoverable condition was observed and handled.
    fn report_error(&self, _kind: ErrorKind) {}

    /// A new picture was appended to the display queue.
    ///
    /// Liveness notification only; the picture is delivered via `show`
    /// when its presentation time arrives.
    fn picture_available(&self) {}
}

/// The decoder's only clock source, supplied by the caller.
pub trait VideoClock: Send + Sync {
    /// The current video PTS, given the PTS of the picture under
    /// consideration (some clock sources need it to pick a timeline).
    ///
    /// Called from the scheduler thread with the decode lock released;
    /// must not block on the decoder.
    fn current_video_clock(&self, candidate_pts: u64) -> u64;
}
