//! Segment body handlers.
//!
//! Each handler parses one segment type and folds it into the
//! [`DecodeModel`]. Version fields make reparsing idempotent: a segment
//! whose version matches the state already held is skipped without
//! touching anything. Corruption inside a body is returned as a
//! [`SegmentError`]; the dispatcher reports it and moves to the next
//! segment.

use dvbsub_protocol::BitCursor;
use log::{debug, warn};
use thiserror::Error;

use crate::clut::{Clut, ClutEntry};
use crate::pixel;
use crate::state::{
    BitDepth, DecodeModel, DisplayDefinition, DisplayWindow, ObjectKind, ObjectPlacement, Page,
    PageState, Region, RegionPlacement,
};

/// A page-composition timeout of zero seconds is treated as this value.
const FALLBACK_TIMEOUT_SECONDS: u32 = 5;

/// Regions larger than this on either axis are rejected as corrupt.
const MAX_REGION_EDGE: u16 = 4096;

/// Corruption detected inside one segment body.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SegmentError {
    /// The body is shorter than the fixed part of its syntax.
    #[error("segment body too short: {got} bytes, need {need}")]
    Undersized { need: usize, got: usize },

    /// Region dimensions are zero or implausibly large.
    #[error("region {id} has invalid dimensions {width}x{height}")]
    BadRegionSize { id: u8, width: u16, height: u16 },

    /// Declared object field lengths do not fit in the segment body.
    #[error("object field lengths exceed segment body")]
    FieldsExceedBody,
}

fn need(body: &[u8], bytes: usize) -> Result<(), SegmentError> {
    if body.len() < bytes {
        Err(SegmentError::Undersized {
            need: bytes,
            got: body.len(),
        })
    } else {
        Ok(())
    }
}

/// Page composition: timeout, page state, and region placements.
///
/// `MODE_CHANGE` is an epoch boundary and clears all decoder state before
/// the version comparison, so the same segment always rebuilds the page.
pub fn handle_page_composition(
    model: &mut DecodeModel,
    page_id: u16,
    body: &[u8],
) -> Result<(), SegmentError> {
    need(body, 2)?;

    let timeout = match body[0] {
        0 => FALLBACK_TIMEOUT_SECONDS,
        t => t as u32,
    };
    let version = body[1] >> 4;
    let state = PageState::from((body[1] >> 2) & 0x03);

    if state == PageState::ModeChange {
        debug!("[segment] page {} mode change, new epoch", page_id);
        model.reset_epoch();
    }

    if let Some(page) = &model.page {
        if page.version == version {
            return Ok(());
        }
    }

    let mut placements = Vec::with_capacity((body.len() - 2) / 6);
    for chunk in body[2..].chunks_exact(6) {
        placements.push(RegionPlacement {
            region_id: chunk[0],
            left: u16::from_be_bytes([chunk[2], chunk[3]]),
            top: u16::from_be_bytes([chunk[4], chunk[5]]),
        });
    }

    model.page = Some(Page {
        id: page_id,
        timeout,
        state,
        version,
        placements,
    });
    model.page_dirty = true;
    Ok(())
}

/// Region composition: geometry, CLUT binding, background fill and the
/// list of objects placed inside the region.
pub fn handle_region_composition(
    model: &mut DecodeModel,
    body: &[u8],
) -> Result<(), SegmentError> {
    need(body, 10)?;
    let mut cursor = BitCursor::new(body);

    let id = cursor.read(8) as u8;
    let version = cursor.read(4) as u8;
    let fill = cursor.read(1) == 1;
    cursor.skip(3);
    let width = cursor.read(16) as u16;
    let height = cursor.read(16) as u16;
    cursor.skip(3); // level of compatibility
    let depth = BitDepth::from_wire(cursor.read(3));
    cursor.skip(2);
    let clut_id = cursor.read(8) as u8;
    let background_8bit = cursor.read(8) as u8;
    let background_4bit = cursor.read(4) as u8;
    let background_2bit = cursor.read(2) as u8;
    cursor.skip(2);

    if width == 0 || height == 0 || width > MAX_REGION_EDGE || height > MAX_REGION_EDGE {
        return Err(SegmentError::BadRegionSize { id, width, height });
    }

    let background = match depth {
        BitDepth::Two => background_2bit,
        BitDepth::Four => background_4bit,
        BitDepth::Eight => background_8bit,
    };

    let index = match model.regions.iter().position(|region| region.id == id) {
        Some(index) => index,
        None => {
            model.regions.push(Region {
                id,
                // Forced mismatch so the first definition is always applied.
                version: version.wrapping_add(1),
                width: 0,
                height: 0,
                depth,
                clut_id,
                background,
                pixels: Vec::new(),
                objects: Vec::new(),
            });
            model.regions.len() - 1
        }
    };
    let region = &mut model.regions[index];

    if region.version == version {
        return Ok(());
    }
    region.version = version;
    region.depth = depth;
    region.clut_id = clut_id;
    region.background = background;

    let area = width as usize * height as usize;
    let realloc = region.width != width || region.height != height;
    region.width = width;
    region.height = height;
    if realloc {
        region.pixels = vec![0; area];
    }
    if fill || realloc {
        region.clear_to_background();
    }
    // Object placements are redefined wholesale.
    region.objects.clear();

    while cursor.remaining_bits() >= 48 {
        let object_id = cursor.read(16) as u16;
        let kind = ObjectKind::from(cursor.read(2) as u8);
        cursor.skip(2); // provider flag
        let left = cursor.read(12) as u16;
        cursor.skip(4);
        let top = cursor.read(12) as u16;
        let (foreground, background) = if kind.is_textual() {
            if cursor.remaining_bits() < 16 {
                break;
            }
            (cursor.read(8) as u8, cursor.read(8) as u8)
        } else {
            (0, 0)
        };
        region.objects.push(ObjectPlacement {
            object_id,
            kind,
            left,
            top,
            foreground,
            background,
            text: Vec::new(),
        });
    }
    Ok(())
}

/// CLUT definition: entry updates applied on top of the default tables.
pub fn handle_clut_definition(model: &mut DecodeModel, body: &[u8]) -> Result<(), SegmentError> {
    need(body, 2)?;
    let id = body[0];
    let version = body[1] >> 4;

    if let Some(existing) = model.clut(id) {
        if existing.version == version {
            return Ok(());
        }
    }

    let mut clut = Clut::with_defaults(id, version);
    let mut cursor = BitCursor::new(&body[2..]);

    while cursor.remaining_bits() >= 16 {
        let entry_id = cursor.read(8) as usize;
        let tables = cursor.read(3) as u8;
        cursor.skip(4);
        let full_range = cursor.read(1) == 1;

        let mut entry = if full_range {
            if cursor.remaining_bits() < 32 {
                break;
            }
            ClutEntry {
                y: cursor.read(8) as u8,
                cr: cursor.read(8) as u8,
                cb: cursor.read(8) as u8,
                t: cursor.read(8) as u8,
            }
        } else {
            ClutEntry {
                y: (cursor.read(6) as u8) << 2,
                cr: (cursor.read(4) as u8) << 4,
                cb: (cursor.read(4) as u8) << 4,
                t: (cursor.read(2) as u8) << 6,
            }
        };
        // Zero luma means fully transparent black.
        if entry.y == 0 {
            entry.cb = 0;
            entry.cr = 0;
            entry.t = 0xFF;
        }

        if tables & 0x04 != 0 {
            if entry_id < clut.tables.c2.len() {
                clut.tables.c2[entry_id] = entry;
            } else {
                debug!("[segment] 2-bit CLUT entry id {} out of range", entry_id);
            }
        }
        if tables & 0x02 != 0 {
            if entry_id < clut.tables.c4.len() {
                clut.tables.c4[entry_id] = entry;
            } else {
                debug!("[segment] 4-bit CLUT entry id {} out of range", entry_id);
            }
        }
        if tables & 0x01 != 0 {
            clut.tables.c8[entry_id] = entry;
        }
    }

    match model.cluts.iter_mut().find(|c| c.id == id) {
        Some(slot) => *slot = clut,
        None => model.cluts.push(clut),
    }
    Ok(())
}

/// Object data: run-length pixel fields or character code strings,
/// delivered to every placement of the object across all regions.
pub fn handle_object_data(model: &mut DecodeModel, body: &[u8]) -> Result<(), SegmentError> {
    need(body, 3)?;
    let mut cursor = BitCursor::new(body);

    let object_id = cursor.read(16) as u16;
    let _version = cursor.read(4) as u8;
    let coding_method = cursor.read(2);
    let non_modifying = cursor.read(1) == 1;
    cursor.skip(1);

    match coding_method {
        0 => {
            need(body, 7)?;
            let top_len = cursor.read(16) as usize;
            let bottom_len = cursor.read(16) as usize;
            if body.len() < top_len + bottom_len + 7 {
                return Err(SegmentError::FieldsExceedBody);
            }
            let top_field = &body[7..7 + top_len];
            let bottom_field = &body[7 + top_len..7 + top_len + bottom_len];

            for region in &mut model.regions {
                let targets: Vec<(u16, u16)> = region
                    .objects
                    .iter()
                    .filter(|p| p.object_id == object_id && p.kind == ObjectKind::Bitmap)
                    .map(|p| (p.left, p.top))
                    .collect();
                let (width, height, depth) =
                    (region.width as usize, region.height as usize, region.depth);
                for (left, top) in targets {
                    pixel::decode_field(
                        &mut region.pixels,
                        width,
                        height,
                        left as usize,
                        top as usize,
                        depth,
                        top_field,
                        non_modifying,
                    );
                    // A missing bottom field duplicates the top field
                    // one scan line down.
                    let bottom = if bottom_len > 0 { bottom_field } else { top_field };
                    pixel::decode_field(
                        &mut region.pixels,
                        width,
                        height,
                        left as usize,
                        top as usize + 1,
                        depth,
                        bottom,
                        non_modifying,
                    );
                }
            }
        }
        1 => {
            let count = cursor.read(8) as usize;
            let mut codes = Vec::with_capacity(count);
            for _ in 0..count {
                if cursor.remaining_bits() < 16 {
                    break;
                }
                codes.push(cursor.read(16) as u16);
            }
            for region in &mut model.regions {
                for placement in &mut region.objects {
                    if placement.object_id == object_id && placement.kind.is_textual() {
                        // Code strings accumulate across segments until the
                        // placement is redefined.
                        placement.text.extend_from_slice(&codes);
                    }
                }
            }
        }
        other => {
            warn!(
                "[segment] object {} uses unsupported coding method {}",
                object_id, other
            );
        }
    }
    Ok(())
}

/// Display definition: intended display size and optional sub-window.
pub fn handle_display_definition(
    model: &mut DecodeModel,
    body: &[u8],
) -> Result<(), SegmentError> {
    need(body, 5)?;
    let mut cursor = BitCursor::new(body);

    let version = cursor.read(4) as u8;
    if model.display.version == Some(version) {
        return Ok(());
    }
    let windowed = cursor.read(1) == 1;
    cursor.skip(3);
    let width = cursor.read(16) as u16 + 1;
    let height = cursor.read(16) as u16 + 1;

    let window = if windowed {
        need(body, 13)?;
        Some(DisplayWindow {
            x_min: cursor.read(16) as u16,
            x_max: cursor.read(16) as u16,
            y_min: cursor.read(16) as u16,
            y_max: cursor.read(16) as u16,
        })
    } else {
        None
    };

    model.display = DisplayDefinition {
        version: Some(version),
        width,
        height,
        window,
    };
    Ok(())
}
