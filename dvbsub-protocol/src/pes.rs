//! PES envelope parsing.
//!
//! A subtitle access unit arrives as one Packetized Elementary Stream
//! packet: start code prefix, private_stream_1 id, packet length, header
//! flags, a 33-bit PTS spread over five marker-delimited bytes, then the
//! subtitle payload.

use crate::error::ProtocolError;

/// PES stream id for private_stream_1, the carrier for DVB subtitles.
pub const STREAM_ID_PRIVATE_1: u8 = 0xBD;

/// PTS resolution in ticks per second.
pub const PTS_PER_SECOND: u64 = 90_000;

/// Modulus of the 33-bit PTS counter.
pub const PTS_MODULUS: u64 = 1 << 33;

/// A validated PES packet holding a subtitle unit.
#[derive(Debug, Clone, Copy)]
pub struct PesPacket<'a> {
    /// Presentation timestamp, 33 bits at 90 kHz.
    pub pts: u64,
    /// Payload after the PES header: data identifier, subtitle stream id,
    /// segments, end marker.
    pub payload: &'a [u8],
}

impl<'a> PesPacket<'a> {
    /// Validate the PES envelope and extract the PTS and payload.
    ///
    /// Requires an unscrambled private_stream_1 packet announcing a PTS.
    pub fn parse(packet: &'a [u8]) -> Result<Self, ProtocolError> {
        if packet.len() < 14 {
            return Err(ProtocolError::PacketTooShort(packet.len()));
        }
        if packet[0] != 0x00 || packet[1] != 0x00 || packet[2] != 0x01 {
            return Err(ProtocolError::InvalidStartCode([
                packet[0], packet[1], packet[2],
            ]));
        }
        if packet[3] != STREAM_ID_PRIVATE_1 {
            return Err(ProtocolError::NotPrivateStream(packet[3]));
        }

        let packet_length = u16::from_be_bytes([packet[4], packet[5]]) as usize;
        if packet_length < 3 || packet_length + 6 > packet.len() {
            return Err(ProtocolError::InvalidPacketLength {
                declared: packet_length,
                actual: packet.len(),
            });
        }

        let scrambling = (packet[6] >> 4) & 0x03;
        if scrambling != 0 {
            return Err(ProtocolError::Scrambled(scrambling));
        }

        let pts_dts_flags = (packet[7] >> 6) & 0x03;
        if pts_dts_flags != 0b10 && pts_dts_flags != 0b11 {
            return Err(ProtocolError::MissingPts(pts_dts_flags));
        }

        let header_length = packet[8];
        if header_length < 5 || header_length as usize + 3 > packet_length {
            return Err(ProtocolError::InvalidHeaderLength(header_length));
        }

        let pts = read_pts(&packet[9..14]);

        let payload_start = 9 + header_length as usize;
        let payload_end = 6 + packet_length;
        let payload = &packet[payload_start..payload_end];
        if payload.len() < 3 {
            return Err(ProtocolError::PayloadTooShort(payload.len()));
        }

        Ok(Self { pts, payload })
    }
}

/// Assemble the 33-bit PTS from the five marker-delimited PES bytes.
fn read_pts(b: &[u8]) -> u64 {
    ((b[0] as u64 >> 1) & 0x07) << 30
        | (b[1] as u64) << 22
        | ((b[2] as u64 >> 1) & 0x7F) << 15
        | (b[3] as u64) << 7
        | (b[4] as u64 >> 1)
}
