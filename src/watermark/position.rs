//! Placement of the overlay on the base image.
//!
//! Corners sit a fixed [`PADDING`] away from the two nearest edges, center
//! is centered on both axes. Offsets are signed: an overlay wider or taller
//! than the base yields negative values, which the compositor clips.

use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Distance in pixels between the overlay and the nearest image edges.
pub const PADDING: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, EnumString)]
pub enum Position {
    #[strum(serialize = "topleft", to_string = "top-left")]
    TopLeft,
    #[strum(serialize = "topright", to_string = "top-right")]
    TopRight,
    #[strum(serialize = "bottomleft", to_string = "bottom-left")]
    BottomLeft,
    #[strum(serialize = "bottomright", to_string = "bottom-right")]
    BottomRight,
    #[default]
    #[strum(serialize = "center")]
    Center,
}

impl Position {
    /// Parse a user-supplied position name.
    ///
    /// Case, `-`, `_` and spaces are ignored, so `bottomright`, `bottom-right`
    /// and `Bottom_Right` are equivalent. Anything unrecognised is `Center`.
    pub fn parse_lossy(name: &str) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        Position::from_str(&normalized).unwrap_or_default()
    }
}

/// Top-left offset at which the overlay is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub left: i64,
    pub top: i64,
}

impl Placement {
    pub fn new(left: i64, top: i64) -> Self {
        Self { left, top }
    }
}

/// Compute where an `overlay_w` x `overlay_h` overlay goes on a
/// `base_w` x `base_h` image.
pub fn calculate_placement(
    position: Position,
    base_w: u32,
    base_h: u32,
    overlay_w: u32,
    overlay_h: u32,
) -> Placement {
    let (bw, bh) = (base_w as i64, base_h as i64);
    let (ow, oh) = (overlay_w as i64, overlay_h as i64);

    match position {
        Position::TopLeft => Placement::new(PADDING, PADDING),
        Position::TopRight => Placement::new(bw - ow - PADDING, PADDING),
        Position::BottomLeft => Placement::new(PADDING, bh - oh - PADDING),
        Position::BottomRight => Placement::new(bw - ow - PADDING, bh - oh - PADDING),
        // Integer division truncates toward zero, matching a floor for the
        // common case where the overlay fits.
        Position::Center => Placement::new((bw - ow) / 2, (bh - oh) / 2),
    }
}
