//! DVB subtitle decoder.
//!
//! Decodes subtitle display sets (EN 300 743) carried in PES packets:
//! segment parsing, run-length pixel reconstruction, CLUT resolution, and
//! presentation scheduling against a caller-supplied video clock.
//!
//! The entry point is [`DvbSubDecoder`]: create it with the page ids from
//! the subtitling descriptor and implementations of [`SubtitleCallbacks`]
//! and [`VideoClock`], call [`DvbSubDecoder::start`], then feed complete
//! subtitle PES packets to [`DvbSubDecoder::submit_packet`]. Composed
//! pictures arrive through `SubtitleCallbacks::show` when their
//! presentation time comes up on the clock.

pub mod callback;
pub mod clut;
pub mod compose;
pub mod decoder;
pub mod display;
pub mod error;
pub mod handlers;
pub mod pixel;
pub mod state;

pub use callback::{ErrorKind, SubtitleCallbacks, VideoClock};
pub use clut::{Clut, ClutEntry, Rgba};
pub use compose::{Picture, PictureRegion, RegionContent};
pub use decoder::DvbSubDecoder;
pub use error::{DecoderError, Result};
