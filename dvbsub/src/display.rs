//! Display scheduling.
//!
//! Composed pictures queue up here until their presentation time arrives
//! on the caller's video clock. All PTS comparisons are wraparound-safe
//! over the 33-bit timestamp space: `a` counts as at-or-after `b` when
//! the wrapped distance from `b` to `a` is less than half the modulus.
//!
//! The queue itself is a plain state machine; the owning decoder drives
//! it from the scheduler thread and performs the clock call with its
//! lock released.

use std::collections::VecDeque;
use std::sync::Arc;

use dvbsub_protocol::{PTS_MODULUS, PTS_PER_SECOND};
use log::debug;

use crate::compose::Picture;

/// Pictures timestamped further than this ahead of the clock are
/// considered anomalous and dropped.
const FAR_FUTURE_THRESHOLD: u64 = 60 * PTS_PER_SECOND;

/// True when `a` is at or after `b` on the wrapping 33-bit timeline.
pub fn pts_at_or_after(a: u64, b: u64) -> bool {
    a.wrapping_sub(b) & (PTS_MODULUS - 1) < PTS_MODULUS / 2
}

/// Wrapped absolute distance between two timestamps.
pub fn pts_distance(a: u64, b: u64) -> u64 {
    let forward = a.wrapping_sub(b) & (PTS_MODULUS - 1);
    forward.min(PTS_MODULUS - forward)
}

/// What one scheduling pass decided.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// `Some` when the displayed picture changed: the new picture, or
    /// `None` to clear the display.
    pub show: Option<Option<Arc<Picture>>>,
    /// Timing anomalies encountered (unusable clock, far-future drops).
    pub time_errors: u32,
}

/// Pending pictures plus the one currently on display.
#[derive(Debug, Default)]
pub struct DisplayQueue {
    pending: VecDeque<Arc<Picture>>,
    shown: Option<Arc<Picture>>,
}

impl DisplayQueue {
    pub fn push(&mut self, picture: Arc<Picture>) {
        self.pending.push_back(picture);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn shown(&self) -> Option<&Arc<Picture>> {
        self.shown.as_ref()
    }

    /// The picture the next clock query concerns: the head of the queue
    /// if any, otherwise the picture on display.
    pub fn candidate(&self) -> Option<Arc<Picture>> {
        self.pending.front().or(self.shown.as_ref()).cloned()
    }

    /// Timestamp of [`Self::candidate`].
    pub fn candidate_pts(&self) -> Option<u64> {
        self.candidate().map(|picture| picture.pts)
    }

    /// Drop everything; the display is left untouched.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// One scheduling pass against a clock reading.
    ///
    /// Consumes every due picture from the head of the queue; when several
    /// are due at once only the newest survives to the display. The shown
    /// picture is evicted when the clock is unusable or has moved further
    /// from its timestamp than its timeout allows.
    pub fn advance(&mut self, clock: u64) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let mut next: Option<Arc<Picture>> = None;

        while let Some(head) = self.pending.front() {
            if pts_at_or_after(clock, head.pts) {
                if let Some(superseded) = next.take() {
                    debug!(
                        "[display] picture pts {} superseded before display",
                        superseded.pts
                    );
                }
                next = self.pending.pop_front();
            } else if head.pts.wrapping_sub(clock) & (PTS_MODULUS - 1) > FAR_FUTURE_THRESHOLD {
                debug!(
                    "[display] dropping picture pts {} far ahead of clock {}",
                    head.pts, clock
                );
                self.pending.pop_front();
                outcome.time_errors += 1;
            } else {
                break;
            }
        }

        if let Some(next) = next {
            self.shown = Some(next.clone());
            outcome.show = Some(Some(next));
        }

        if let Some(shown) = &self.shown {
            let timed_out =
                pts_distance(shown.pts, clock) > shown.timeout as u64 * PTS_PER_SECOND;
            if clock == 0 || timed_out {
                if clock == 0 {
                    outcome.time_errors += 1;
                }
                debug!("[display] evicting picture pts {}", shown.pts);
                self.shown = None;
                outcome.show = Some(None);
            }
        }
        outcome
    }
}
