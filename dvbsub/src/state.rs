//! Mutable, versioned decoder state.
//!
//! One decoder instance owns exactly one page definition, a list of
//! regions and a list of CLUTs, all updated in place by the segment
//! handlers. A page-composition segment in `MODE_CHANGE` state marks an
//! epoch boundary and discards all of it.

use crate::clut::Clut;

/// Page composition state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Normal,
    Acquisition,
    ModeChange,
}

impl From<u8> for PageState {
    fn from(code: u8) -> Self {
        match code & 0x03 {
            0x01 => PageState::Acquisition,
            0x02 => PageState::ModeChange,
            _ => PageState::Normal,
        }
    }
}

/// Pixel depth of a region's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Two,
    Four,
    Eight,
}

impl BitDepth {
    /// Decode the 3-bit region depth field; unknown codes fall back to
    /// 8-bit, the least destructive interpretation.
    pub fn from_wire(code: u32) -> Self {
        match code {
            1 => BitDepth::Two,
            2 => BitDepth::Four,
            _ => BitDepth::Eight,
        }
    }

    /// Number of palette entries at this depth.
    pub fn entries(self) -> usize {
        match self {
            BitDepth::Two => 4,
            BitDepth::Four => 16,
            BitDepth::Eight => 256,
        }
    }
}

/// Placement of a region on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPlacement {
    pub region_id: u8,
    pub left: u16,
    pub top: u16,
}

/// The active page definition.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: u16,
    /// Display timeout in seconds; zero on the wire is clamped to five.
    pub timeout: u32,
    pub state: PageState,
    pub version: u8,
    pub placements: Vec<RegionPlacement>,
}

/// Kind of an object placed in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Bitmap,
    Character,
    CompositeString,
    /// Reserved kind codes; placements are kept but never rendered.
    Other(u8),
}

impl From<u8> for ObjectKind {
    fn from(code: u8) -> Self {
        match code & 0x03 {
            0x00 => ObjectKind::Bitmap,
            0x01 => ObjectKind::Character,
            0x02 => ObjectKind::CompositeString,
            other => ObjectKind::Other(other),
        }
    }
}

impl ObjectKind {
    /// Character-like kinds carry foreground/background codes and text.
    pub fn is_textual(self) -> bool {
        matches!(self, ObjectKind::Character | ObjectKind::CompositeString)
    }
}

/// Placement of one object inside a region.
#[derive(Debug, Clone)]
pub struct ObjectPlacement {
    pub object_id: u16,
    pub kind: ObjectKind,
    pub left: u16,
    pub top: u16,
    /// Foreground palette index; character kinds only.
    pub foreground: u8,
    /// Background palette index; character kinds only.
    pub background: u8,
    /// Decoded code points; character kinds only.
    pub text: Vec<u16>,
}

/// One region: a rectangular indexed-colour pixel area.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: u8,
    pub version: u8,
    pub width: u16,
    pub height: u16,
    pub depth: BitDepth,
    pub clut_id: u8,
    pub background: u8,
    /// `width * height` palette indices; reallocated only on resize.
    pub pixels: Vec<u8>,
    pub objects: Vec<ObjectPlacement>,
}

impl Region {
    /// Fill the pixel buffer with the background index.
    pub fn clear_to_background(&mut self) {
        let background = self.background;
        self.pixels.fill(background);
    }
}

/// Sub-window of a windowed display definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    pub x_min: u16,
    pub x_max: u16,
    pub y_min: u16,
    pub y_max: u16,
}

/// The intended display size, from the display-definition segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayDefinition {
    /// `None` until a display-definition segment has been decoded.
    pub version: Option<u8>,
    pub width: u16,
    pub height: u16,
    pub window: Option<DisplayWindow>,
}

impl DisplayDefinition {
    /// Coordinate origin for compositing regions into a picture.
    pub fn origin(&self) -> (u16, u16) {
        match self.window {
            Some(window) => (window.x_min, window.y_min),
            None => (0, 0),
        }
    }
}

impl Default for DisplayDefinition {
    /// Standard-definition 720x576, non-windowed.
    fn default() -> Self {
        Self {
            version: None,
            width: 720,
            height: 576,
            window: None,
        }
    }
}

/// Everything the segment handlers mutate, as one consistency domain.
#[derive(Debug, Default)]
pub struct DecodeModel {
    pub page: Option<Page>,
    pub regions: Vec<Region>,
    pub cluts: Vec<Clut>,
    pub display: DisplayDefinition,
    /// PTS of the PES packet currently being decoded.
    pub pts: u64,
    /// Set when a page-composition segment was reparsed in this pass.
    pub page_dirty: bool,
}

impl DecodeModel {
    pub fn region_mut(&mut self, id: u8) -> Option<&mut Region> {
        self.regions.iter_mut().find(|region| region.id == id)
    }

    pub fn region(&self, id: u8) -> Option<&Region> {
        self.regions.iter().find(|region| region.id == id)
    }

    pub fn clut(&self, id: u8) -> Option<&Clut> {
        self.cluts.iter().find(|clut| clut.id == id)
    }

    /// Epoch boundary: discard the page, all regions and all CLUTs.
    pub fn reset_epoch(&mut self) {
        self.page = None;
        self.regions.clear();
        self.cluts.clear();
    }
}
