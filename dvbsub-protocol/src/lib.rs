//! Wire format definitions for the DVB subtitling bitstream.
//!
//! This crate covers the transport-facing half of a DVB subtitle decoder:
//! the PES envelope around one subtitle access unit, the segment framing
//! inside it, and the bit-level cursor the segment bodies are decoded with.
//! It holds no decoder state; the `dvbsub` crate builds the stateful
//! decoder on top of it.
//!
//! # Payload layout
//!
//! ```text
//! +-----------+--------+-------------------------------------------+------+
//! | PES hdr   | 0x20 00| segment | segment | ...                   | 0xFF |
//! | (PTS)     | ident  |                                           | end  |
//! +-----------+--------+-------------------------------------------+------+
//!
//! segment = +------+------+---------+--------+----------------+
//!           | 0x0F | type | page id | length |  body (length) |
//!           +------+------+---------+--------+----------------+
//!           | 1 B  | 1 B  |  2 B BE |  2 B BE|  length bytes  |
//!           +------+------+---------+--------+----------------+
//! ```

pub mod bits;
pub mod error;
pub mod pes;
pub mod segment;

pub use bits::BitCursor;
pub use error::ProtocolError;
pub use pes::{PesPacket, PTS_MODULUS, PTS_PER_SECOND, STREAM_ID_PRIVATE_1};
pub use segment::{
    Segment, SegmentHeader, SegmentReader, SegmentType, DATA_IDENTIFIER, END_MARKER,
    SEGMENT_HEADER_SIZE, SUBTITLE_STREAM_ID, SYNC_BYTE,
};
