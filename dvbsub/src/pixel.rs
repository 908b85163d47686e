//! Run-length pixel decoding.
//!
//! Object pixel data arrives as a sequence of data sub-blocks, each
//! holding a run-length coded string at one of three bit depths, optional
//! remap tables for depth mismatches, and an end-of-line marker. The
//! format natively interleaves two scan lines per field, so end-of-line
//! advances the target by two rows.
//!
//! The nested conditional bit reads mirror the wire grammar directly;
//! each depth is its own small state machine.

use dvbsub_protocol::BitCursor;
use log::debug;

use crate::state::BitDepth;

/// Data sub-block type codes.
mod block {
    pub const PIXELS_2BIT: u8 = 0x10;
    pub const PIXELS_4BIT: u8 = 0x11;
    pub const PIXELS_8BIT: u8 = 0x12;
    pub const MAP_2_TO_4: u8 = 0x20;
    pub const MAP_2_TO_8: u8 = 0x21;
    pub const MAP_4_TO_8: u8 = 0x22;
    pub const END_OF_LINE: u8 = 0xF0;
}

/// In 2- and 4-bit modes (and, following the source precedent, 8-bit as
/// well) palette index 1 means "leave the pixel unchanged" when the
/// object's non-modifying-colour flag is set.
const NON_MODIFYING_INDEX: u32 = 1;

/// Decode one field of object pixel data into a region's pixel buffer.
///
/// `x`/`y` is the object placement inside the region; rows advance by two
/// because the field covers every other scan line.
pub fn decode_field(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    x: usize,
    mut y: usize,
    depth: BitDepth,
    field: &[u8],
    non_modifying: bool,
) {
    if x >= width || y >= height {
        debug!("[pixel] object offset ({}, {}) outside region", x, y);
        return;
    }

    let mut map_2_to_4: [u8; 4] = [0x0, 0x7, 0x8, 0xF];
    let mut map_2_to_8: [u8; 4] = [0x00, 0x77, 0x88, 0xFF];
    let mut map_4_to_8: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        0xFF,
    ];

    let mut cursor = BitCursor::new(field);
    let mut offset = 0usize;

    while !cursor.at_end() {
        if y >= height {
            return;
        }
        let row = &mut pixels[y * width + x..(y + 1) * width];

        match cursor.read(8) as u8 {
            block::PIXELS_2BIT => {
                let map = match depth {
                    BitDepth::Eight => Some(&map_2_to_8[..]),
                    BitDepth::Four => Some(&map_2_to_4[..]),
                    BitDepth::Two => None,
                };
                run_2bit(&mut cursor, row, &mut offset, non_modifying, map);
            }
            block::PIXELS_4BIT => {
                let map = match depth {
                    BitDepth::Eight => Some(&map_4_to_8[..]),
                    _ => None,
                };
                run_4bit(&mut cursor, row, &mut offset, non_modifying, map);
            }
            block::PIXELS_8BIT => {
                run_8bit(&mut cursor, row, &mut offset, non_modifying);
            }
            block::MAP_2_TO_4 => {
                for slot in map_2_to_4.iter_mut() {
                    *slot = cursor.read(4) as u8;
                }
            }
            block::MAP_2_TO_8 => {
                for slot in map_2_to_8.iter_mut() {
                    *slot = cursor.read(8) as u8;
                }
            }
            block::MAP_4_TO_8 => {
                for slot in map_4_to_8.iter_mut() {
                    *slot = cursor.read(8) as u8;
                }
            }
            block::END_OF_LINE => {
                y += 2;
                offset = 0;
            }
            other => {
                debug!("[pixel] unknown data sub-block 0x{:02X}", other);
            }
        }
    }
}

/// Write one run, rejecting any run that would overflow the row.
///
/// Returns false when the row is exhausted and decoding of this code
/// string must stop.
fn put_run(row: &mut [u8], offset: &mut usize, count: usize, colour: u8, no_modify: bool) -> bool {
    if count == 0 {
        return true;
    }
    if *offset + count > row.len() {
        return false;
    }
    if !no_modify {
        row[*offset..*offset + count].fill(colour);
    }
    *offset += count;
    true
}

fn remap(colour: u32, map: Option<&[u8]>) -> u8 {
    match map {
        Some(map) => map[colour as usize],
        None => colour as u8,
    }
}

/// 2-bit/pixel code string.
fn run_2bit(
    cursor: &mut BitCursor<'_>,
    row: &mut [u8],
    offset: &mut usize,
    non_modifying: bool,
    map: Option<&[u8]>,
) {
    loop {
        if cursor.at_end() {
            break;
        }
        let count;
        let mut colour = cursor.read(2);
        let mut no_modify = false;

        if colour != 0 {
            count = 1;
        } else if cursor.read(1) == 1 {
            count = 3 + cursor.read(3) as usize;
            colour = cursor.read(2);
        } else if cursor.read(1) == 1 {
            // One pixel of colour 0.
            count = 1;
        } else {
            match cursor.read(2) {
                0x00 => break, // end of code string
                0x01 => count = 2,
                0x02 => {
                    count = 12 + cursor.read(4) as usize;
                    colour = cursor.read(2);
                }
                _ => {
                    count = 29 + cursor.read(8) as usize;
                    colour = cursor.read(2);
                }
            }
        }

        if non_modifying && colour == NON_MODIFYING_INDEX {
            no_modify = true;
        }
        if !put_run(row, offset, count, remap(colour, map), no_modify) {
            break;
        }
    }
    cursor.align();
}

/// 4-bit/pixel code string.
fn run_4bit(
    cursor: &mut BitCursor<'_>,
    row: &mut [u8],
    offset: &mut usize,
    non_modifying: bool,
    map: Option<&[u8]>,
) {
    loop {
        if cursor.at_end() {
            break;
        }
        let count;
        let mut colour = cursor.read(4);
        let mut no_modify = false;

        if colour != 0 {
            count = 1;
        } else if cursor.read(1) == 0 {
            if cursor.peek(3) != 0 {
                count = 2 + cursor.read(3) as usize;
            } else {
                cursor.skip(3);
                break; // end of code string
            }
        } else if cursor.read(1) == 0 {
            count = 4 + cursor.read(2) as usize;
            colour = cursor.read(4);
        } else {
            match cursor.read(2) {
                0x00 => count = 1,
                0x01 => count = 2,
                0x02 => {
                    count = 9 + cursor.read(4) as usize;
                    colour = cursor.read(4);
                }
                _ => {
                    count = 25 + cursor.read(8) as usize;
                    colour = cursor.read(4);
                }
            }
        }

        if non_modifying && colour == NON_MODIFYING_INDEX {
            no_modify = true;
        }
        if !put_run(row, offset, count, remap(colour, map), no_modify) {
            break;
        }
    }
    cursor.align();
}

/// 8-bit/pixel code string. Never remapped: it already matches the
/// deepest region depth.
fn run_8bit(cursor: &mut BitCursor<'_>, row: &mut [u8], offset: &mut usize, non_modifying: bool) {
    loop {
        if cursor.at_end() {
            break;
        }
        let count;
        let mut colour = cursor.read(8);
        let mut no_modify = false;

        if colour != 0 {
            count = 1;
        } else if cursor.read(1) == 0 {
            if cursor.peek(7) != 0 {
                count = cursor.read(7) as usize;
            } else {
                cursor.skip(7);
                break; // end of code string
            }
        } else {
            count = cursor.read(7) as usize;
            colour = cursor.read(8);
        }

        if non_modifying && colour == NON_MODIFYING_INDEX {
            no_modify = true;
        }
        if !put_run(row, offset, count, colour as u8, no_modify) {
            break;
        }
    }
    cursor.align();
}
