//! Subtitle segment stream walking.
//!
//! After the PES header the payload is a data identifier byte, a subtitle
//! stream id byte, then a run of segments. Each segment starts with a sync
//! byte and a common header (type, page id, body length); the stream ends
//! with a one-byte end marker.

use crate::error::ProtocolError;

/// Sync byte opening every subtitle segment.
pub const SYNC_BYTE: u8 = 0x0F;

/// End-of-PES-data marker closing the segment run.
pub const END_MARKER: u8 = 0xFF;

/// Data identifier announcing DVB subtitle data.
pub const DATA_IDENTIFIER: u8 = 0x20;

/// Subtitle stream id within the PES payload (always zero).
pub const SUBTITLE_STREAM_ID: u8 = 0x00;

/// Size of the common segment header: sync + type + page id + length.
pub const SEGMENT_HEADER_SIZE: usize = 6;

/// Segment type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// Page composition: which regions are visible and where.
    PageComposition,
    /// Region composition: region geometry, CLUT binding, object placements.
    RegionComposition,
    /// Colour look-up table definition.
    ClutDefinition,
    /// Object pixel or character data.
    ObjectData,
    /// Intended display size and optional window.
    DisplayDefinition,
    /// End of display set; carries no state.
    EndOfDisplay,
    /// Stuffing; carries no state.
    Stuffing,
    /// Any code this decoder does not recognize.
    Unknown(u8),
}

impl From<u8> for SegmentType {
    fn from(code: u8) -> Self {
        match code {
            0x10 => SegmentType::PageComposition,
            0x11 => SegmentType::RegionComposition,
            0x12 => SegmentType::ClutDefinition,
            0x13 => SegmentType::ObjectData,
            0x14 => SegmentType::DisplayDefinition,
            0x80 => SegmentType::EndOfDisplay,
            0xFF => SegmentType::Stuffing,
            other => SegmentType::Unknown(other),
        }
    }
}

impl SegmentType {
    /// The wire code for this segment type.
    pub fn code(self) -> u8 {
        match self {
            SegmentType::PageComposition => 0x10,
            SegmentType::RegionComposition => 0x11,
            SegmentType::ClutDefinition => 0x12,
            SegmentType::ObjectData => 0x13,
            SegmentType::DisplayDefinition => 0x14,
            SegmentType::EndOfDisplay => 0x80,
            SegmentType::Stuffing => 0xFF,
            SegmentType::Unknown(code) => code,
        }
    }
}

/// Common segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Segment type code.
    pub segment_type: SegmentType,
    /// Page this segment targets.
    pub page_id: u16,
    /// Declared body length in bytes.
    pub length: u16,
}

/// One segment with its bound-checked body.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub header: SegmentHeader,
    /// Exactly `header.length` bytes.
    pub body: &'a [u8],
}

/// Walks the segment run of one PES payload.
///
/// The reader hands each segment body out as a sub-slice of exactly the
/// declared length, so a handler can never leave the stream position
/// anywhere other than the start of the next segment.
pub struct SegmentReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SegmentReader<'a> {
    /// Validate the payload preamble and position the reader on the first
    /// segment.
    pub fn new(payload: &'a [u8]) -> Result<Self, ProtocolError> {
        if payload.len() < 2 {
            return Err(ProtocolError::PayloadTooShort(payload.len()));
        }
        if payload[0] != DATA_IDENTIFIER {
            return Err(ProtocolError::InvalidDataIdentifier(payload[0]));
        }
        if payload[1] != SUBTITLE_STREAM_ID {
            return Err(ProtocolError::InvalidSubtitleStreamId(payload[1]));
        }
        Ok(Self {
            data: payload,
            offset: 2,
        })
    }

    /// The next segment, or `None` once the next byte is not a sync byte.
    pub fn next_segment(&mut self) -> Result<Option<Segment<'a>>, ProtocolError> {
        let remaining = &self.data[self.offset..];
        if remaining.is_empty() || remaining[0] != SYNC_BYTE {
            return Ok(None);
        }
        if remaining.len() < SEGMENT_HEADER_SIZE {
            return Err(ProtocolError::TruncatedSegmentHeader(remaining.len()));
        }

        let segment_type = SegmentType::from(remaining[1]);
        let page_id = u16::from_be_bytes([remaining[2], remaining[3]]);
        let length = u16::from_be_bytes([remaining[4], remaining[5]]);

        let body_start = SEGMENT_HEADER_SIZE;
        let body_end = body_start + length as usize;
        if body_end > remaining.len() {
            return Err(ProtocolError::TruncatedSegment {
                declared: length as usize,
                remaining: remaining.len() - body_start,
            });
        }

        self.offset += body_end;
        Ok(Some(Segment {
            header: SegmentHeader {
                segment_type,
                page_id,
                length,
            },
            body: &remaining[body_start..body_end],
        }))
    }

    /// True if the byte at the current position is the end marker.
    ///
    /// Call after `next_segment` returns `None`; a missing marker is worth
    /// a diagnostic but does not invalidate the segments already decoded.
    pub fn end_marker_present(&self) -> bool {
        self.data.get(self.offset) == Some(&END_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(segments: &[(u8, u16, &[u8])]) -> Vec<u8> {
        let mut out = vec![DATA_IDENTIFIER, SUBTITLE_STREAM_ID];
        for (segment_type, page_id, body) in segments {
            out.push(SYNC_BYTE);
            out.push(*segment_type);
            out.extend_from_slice(&page_id.to_be_bytes());
            out.extend_from_slice(&(body.len() as u16).to_be_bytes());
            out.extend_from_slice(body);
        }
        out.push(END_MARKER);
        out
    }

    #[test]
    fn test_walk_segments() {
        let payload = payload_with(&[
            (0x10, 1, &[0xAA, 0xBB]),
            (0x12, 1, &[0x01]),
            (0x42, 7, &[]),
        ]);
        let mut reader = SegmentReader::new(&payload).unwrap();

        let first = reader.next_segment().unwrap().unwrap();
        assert_eq!(first.header.segment_type, SegmentType::PageComposition);
        assert_eq!(first.header.page_id, 1);
        assert_eq!(first.body, &[0xAA, 0xBB]);

        let second = reader.next_segment().unwrap().unwrap();
        assert_eq!(second.header.segment_type, SegmentType::ClutDefinition);
        assert_eq!(second.body, &[0x01]);

        let third = reader.next_segment().unwrap().unwrap();
        assert_eq!(third.header.segment_type, SegmentType::Unknown(0x42));
        assert_eq!(third.header.page_id, 7);

        assert!(reader.next_segment().unwrap().is_none());
        assert!(reader.end_marker_present());
    }

    #[test]
    fn test_missing_end_marker() {
        let mut payload = payload_with(&[(0x10, 1, &[0xAA])]);
        payload.pop();
        let mut reader = SegmentReader::new(&payload).unwrap();
        assert!(reader.next_segment().unwrap().is_some());
        assert!(reader.next_segment().unwrap().is_none());
        assert!(!reader.end_marker_present());
    }

    #[test]
    fn test_rejects_bad_data_identifier() {
        let payload = [0x21, 0x00, END_MARKER];
        assert!(matches!(
            SegmentReader::new(&payload),
            Err(ProtocolError::InvalidDataIdentifier(0x21))
        ));
    }

    #[test]
    fn test_rejects_bad_stream_id() {
        let payload = [DATA_IDENTIFIER, 0x01, END_MARKER];
        assert!(matches!(
            SegmentReader::new(&payload),
            Err(ProtocolError::InvalidSubtitleStreamId(0x01))
        ));
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut payload = payload_with(&[(0x10, 1, &[0xAA, 0xBB, 0xCC])]);
        payload.truncate(payload.len() - 2); // cut into the body
        let mut reader = SegmentReader::new(&payload).unwrap();
        assert!(matches!(
            reader.next_segment(),
            Err(ProtocolError::TruncatedSegment { .. })
        ));
    }

    #[test]
    fn test_truncated_header_is_an_error() {
        let payload = [DATA_IDENTIFIER, SUBTITLE_STREAM_ID, SYNC_BYTE, 0x10];
        let mut reader = SegmentReader::new(&payload).unwrap();
        assert!(matches!(
            reader.next_segment(),
            Err(ProtocolError::TruncatedSegmentHeader(2))
        ));
    }
}
