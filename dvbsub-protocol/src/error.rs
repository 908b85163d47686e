//! Error types for the DVB subtitle wire format.

use thiserror::Error;

/// Errors raised while validating the PES envelope or walking the
/// subtitle segment stream.
///
/// These describe a packet that cannot be decoded at all. Malformed data
/// *inside* an individual segment is not reported here; the decoder skips
/// the declared segment length and continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet is shorter than the minimum PES header.
    #[error("PES packet too short: {0} bytes")]
    PacketTooShort(usize),

    /// The 3-byte PES start code prefix is missing.
    #[error("Invalid PES start code: {0:02X?}")]
    InvalidStartCode([u8; 3]),

    /// Stream id is not private_stream_1 (0xBD).
    #[error("Not a private_stream_1 packet: stream id 0x{0:02X}")]
    NotPrivateStream(u8),

    /// Declared PES packet length does not fit the buffer.
    #[error("Invalid PES packet length: declared {declared}, buffer {actual}")]
    InvalidPacketLength { declared: usize, actual: usize },

    /// Packet is scrambled; subtitle payloads must be in the clear.
    #[error("Scrambled PES packet: control bits 0b{0:02b}")]
    Scrambled(u8),

    /// The PTS/DTS flags do not announce a PTS.
    #[error("PES packet carries no PTS: flags 0b{0:02b}")]
    MissingPts(u8),

    /// PES header length field is inconsistent with the packet length.
    #[error("Invalid PES header length: {0}")]
    InvalidHeaderLength(u8),

    /// Payload after the PES header is too short to hold a subtitle unit.
    #[error("Subtitle payload too short: {0} bytes")]
    PayloadTooShort(usize),

    /// The payload does not start with the subtitle data identifier (0x20).
    #[error("Invalid data identifier: 0x{0:02X}")]
    InvalidDataIdentifier(u8),

    /// The subtitle stream id byte is not zero.
    #[error("Invalid subtitle stream id: 0x{0:02X}")]
    InvalidSubtitleStreamId(u8),

    /// A segment header declares more body bytes than the payload holds.
    #[error("Truncated segment: declared {declared} bytes, {remaining} remaining")]
    TruncatedSegment { declared: usize, remaining: usize },

    /// A segment header itself is cut off at the end of the payload.
    #[error("Truncated segment header: {0} bytes remaining")]
    TruncatedSegmentHeader(usize),
}
