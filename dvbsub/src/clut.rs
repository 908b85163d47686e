//! Colour look-up tables and colour-space conversion.
//!
//! CLUT entries are carried as YCbCr plus a transparency byte and only
//! converted to RGBA when a picture is composed. The built-in default
//! tables follow EN 300 743 section 10 and are used both as the starting
//! point of every CLUT-definition segment and as the fallback when a page
//! references a CLUT that never arrived.

use once_cell::sync::Lazy;

/// One CLUT entry as carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClutEntry {
    pub y: u8,
    pub cb: u8,
    pub cr: u8,
    /// Transparency; 0 opaque, 0xFF fully transparent.
    pub t: u8,
}

/// An RGBA palette entry of a composed picture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// The three colour tables of one CLUT.
#[derive(Debug, Clone)]
pub struct ClutTables {
    pub c2: [ClutEntry; 4],
    pub c4: [ClutEntry; 16],
    pub c8: [ClutEntry; 256],
}

/// One decoded CLUT-definition segment.
#[derive(Debug, Clone)]
pub struct Clut {
    pub id: u8,
    pub version: u8,
    pub tables: ClutTables,
}

impl Clut {
    /// A CLUT holding the built-in default tables.
    pub fn with_defaults(id: u8, version: u8) -> Self {
        Self {
            id,
            version,
            tables: DEFAULT_TABLES.clone(),
        }
    }
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// BT.601 YCbCr to RGBA; alpha is 255 minus the transparency byte.
pub fn ycbcr_to_rgba(entry: ClutEntry) -> Rgba {
    let y = entry.y as i32;
    let cb = entry.cb as i32 - 128;
    let cr = entry.cr as i32 - 128;
    Rgba {
        r: clamp_u8(y + (359 * cr >> 8)),
        g: clamp_u8(y - (88 * cb >> 8) - (183 * cr >> 8)),
        b: clamp_u8(y + (454 * cb >> 8)),
        a: 255 - entry.t,
    }
}

/// BT.601 RGB to a YCbCr entry; used to express the RGBA defaults of
/// EN 300 743 in the wire representation.
fn entry_from_rgba(r: u8, g: u8, b: u8, a: u8) -> ClutEntry {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    ClutEntry {
        y: clamp_u8((77 * r + 150 * g + 29 * b) >> 8),
        cb: clamp_u8(((-43 * r - 85 * g + 128 * b) >> 8) + 128),
        cr: clamp_u8(((128 * r - 107 * g - 21 * b) >> 8) + 128),
        t: 255 - a,
    }
}

const TRANSPARENT: ClutEntry = ClutEntry {
    y: 0,
    cb: 0,
    cr: 0,
    t: 0xFF,
};

fn default_2bit() -> [ClutEntry; 4] {
    [
        TRANSPARENT,
        entry_from_rgba(255, 255, 255, 255),
        entry_from_rgba(0, 0, 0, 255),
        entry_from_rgba(127, 127, 127, 255),
    ]
}

fn default_4bit() -> [ClutEntry; 16] {
    let mut table = [ClutEntry::default(); 16];
    for (i, slot) in table.iter_mut().enumerate() {
        let i = i as u8;
        *slot = if i == 0 {
            TRANSPARENT
        } else {
            // Bits 0..2 select R/G/B; bit 3 selects half intensity.
            let level = if i & 0x08 != 0 { 127 } else { 255 };
            entry_from_rgba(
                if i & 0x01 != 0 { level } else { 0 },
                if i & 0x02 != 0 { level } else { 0 },
                if i & 0x04 != 0 { level } else { 0 },
                255,
            )
        };
    }
    table
}

fn default_8bit() -> [ClutEntry; 256] {
    let mut table = [ClutEntry::default(); 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let i = i as u8;
        if i == 0 {
            *slot = TRANSPARENT;
            continue;
        }
        let low = |bit: u8, on: i32| if i & bit != 0 { on } else { 0 };
        *slot = if i < 8 {
            // Entries 1..7: saturated primaries at one quarter opacity.
            entry_from_rgba(
                low(0x01, 255) as u8,
                low(0x02, 255) as u8,
                low(0x04, 255) as u8,
                63,
            )
        } else {
            match i & 0x88 {
                0x00 => entry_from_rgba(
                    (low(0x01, 85) + low(0x10, 170)) as u8,
                    (low(0x02, 85) + low(0x20, 170)) as u8,
                    (low(0x04, 85) + low(0x40, 170)) as u8,
                    255,
                ),
                0x08 => entry_from_rgba(
                    (low(0x01, 85) + low(0x10, 170)) as u8,
                    (low(0x02, 85) + low(0x20, 170)) as u8,
                    (low(0x04, 85) + low(0x40, 170)) as u8,
                    127,
                ),
                0x80 => entry_from_rgba(
                    (127 + low(0x01, 43) + low(0x10, 85)) as u8,
                    (127 + low(0x02, 43) + low(0x20, 85)) as u8,
                    (127 + low(0x04, 43) + low(0x40, 85)) as u8,
                    255,
                ),
                _ => entry_from_rgba(
                    (low(0x01, 43) + low(0x10, 85)) as u8,
                    (low(0x02, 43) + low(0x20, 85)) as u8,
                    (low(0x04, 43) + low(0x40, 85)) as u8,
                    255,
                ),
            }
        };
    }
    table
}

/// The built-in default CLUT tables of EN 300 743 section 10.
pub static DEFAULT_TABLES: Lazy<ClutTables> = Lazy::new(|| ClutTables {
    c2: default_2bit(),
    c4: default_4bit(),
    c8: default_8bit(),
});
