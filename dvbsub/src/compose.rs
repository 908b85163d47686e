//! Picture composition.
//!
//! A picture is an immutable snapshot of the page taken after a decode
//! pass: every visible region deep-copied together with its palette
//! resolved to RGBA. Snapshots share nothing with the decoder state, so
//! the scheduler can hand them to the caller while decoding continues.

use bytes::Bytes;
use log::debug;

use crate::clut::{ycbcr_to_rgba, ClutTables, Rgba};
use crate::state::{BitDepth, DecodeModel};

/// Content of one composed region.
#[derive(Debug, Clone)]
pub enum RegionContent {
    /// Indexed pixels plus the palette resolving them to RGBA.
    Bitmap { pixels: Bytes, palette: Vec<Rgba> },
    /// Character codes to be rendered by the caller.
    Text {
        codes: Vec<u16>,
        foreground: Rgba,
        background: Rgba,
    },
}

/// One region of a composed picture, placed in display coordinates.
///
/// Placement offsets are summed from 16-bit wire fields, so the totals
/// are carried wider than any single field.
#[derive(Debug, Clone)]
pub struct PictureRegion {
    pub left: u32,
    pub top: u32,
    pub width: u16,
    pub height: u16,
    pub content: RegionContent,
}

/// A complete composed subtitle picture.
#[derive(Debug, Clone)]
pub struct Picture {
    /// Presentation timestamp at 90 kHz.
    pub pts: u64,
    /// Seconds after which the picture expires on its own.
    pub timeout: u32,
    pub display_width: u16,
    pub display_height: u16,
    /// May be empty: an empty picture clears the display.
    pub regions: Vec<PictureRegion>,
}

fn resolve_palette(tables: &ClutTables, depth: BitDepth) -> Vec<Rgba> {
    match depth {
        BitDepth::Two => tables.c2.iter().copied().map(ycbcr_to_rgba).collect(),
        BitDepth::Four => tables.c4.iter().copied().map(ycbcr_to_rgba).collect(),
        BitDepth::Eight => tables.c8.iter().copied().map(ycbcr_to_rgba).collect(),
    }
}

/// Compose a picture from the current page, or `None` without one.
///
/// Regions whose CLUT has not arrived yet are left out of the picture;
/// they become visible once a later display set delivers the table.
pub fn compose(model: &DecodeModel) -> Option<Picture> {
    let page = model.page.as_ref()?;
    let (origin_x, origin_y) = model.display.origin();
    let mut regions = Vec::with_capacity(page.placements.len());

    for placement in &page.placements {
        let region = match model.region(placement.region_id) {
            Some(region) => region,
            None => {
                debug!(
                    "[compose] page {} references undefined region {}",
                    page.id, placement.region_id
                );
                continue;
            }
        };
        if region.pixels.is_empty() {
            continue;
        }
        let clut = match model.clut(region.clut_id) {
            Some(clut) => clut,
            None => {
                debug!(
                    "[compose] region {} binds undefined CLUT {}, not composed",
                    region.id, region.clut_id
                );
                continue;
            }
        };
        let palette = resolve_palette(&clut.tables, region.depth);
        let left = origin_x as u32 + placement.left as u32;
        let top = origin_y as u32 + placement.top as u32;

        regions.push(PictureRegion {
            left,
            top,
            width: region.width,
            height: region.height,
            content: RegionContent::Bitmap {
                pixels: Bytes::copy_from_slice(&region.pixels),
                palette: palette.clone(),
            },
        });

        for object in &region.objects {
            if !object.kind.is_textual() || object.text.is_empty() {
                continue;
            }
            regions.push(PictureRegion {
                left: left + object.left as u32,
                top: top + object.top as u32,
                width: region.width,
                height: region.height,
                content: RegionContent::Text {
                    codes: object.text.clone(),
                    foreground: palette
                        .get(object.foreground as usize)
                        .copied()
                        .unwrap_or_default(),
                    background: palette
                        .get(object.background as usize)
                        .copied()
                        .unwrap_or_default(),
                },
            });
        }
    }

    Some(Picture {
        pts: model.pts,
        timeout: page.timeout,
        display_width: model.display.width,
        display_height: model.display.height,
        regions,
    })
}
