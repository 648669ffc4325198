//! Alpha "over" compositing of an overlay onto a base image.

use image::{Rgba, RgbaImage};

use super::position::Placement;

/// Draw `overlay` onto `base` at `placement`.
///
/// `opacity` (0.0 to 1.0) multiplies the overlay's own alpha channel.
/// Parts of the overlay falling outside the base are clipped.
pub fn composite(base: &mut RgbaImage, overlay: &RgbaImage, placement: Placement, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity == 0.0 {
        return;
    }

    let base_w = base.width() as i64;
    let base_h = base.height() as i64;

    let x_start = placement.left.max(0);
    let y_start = placement.top.max(0);
    let x_end = (placement.left + overlay.width() as i64).min(base_w);
    let y_end = (placement.top + overlay.height() as i64).min(base_h);

    for by in y_start..y_end {
        for bx in x_start..x_end {
            let ox = (bx - placement.left) as u32;
            let oy = (by - placement.top) as u32;

            let fg = *overlay.get_pixel(ox, oy);
            if fg[3] == 0 {
                continue;
            }

            let pixel = base.get_pixel_mut(bx as u32, by as u32);
            *pixel = blend_over(*pixel, fg, opacity);
        }
    }
}

/// Porter-Duff "over": `out = fg * a_fg + bg * a_bg * (1 - a_fg)`.
pub fn blend_over(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |fg: u8, bg: u8| -> u8 {
        let fg = fg as f32 / 255.0;
        let bg = bg as f32 / 255.0;
        let value = (fg * fg_alpha + bg * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(foreground[0], background[0]),
        channel(foreground[1], background[1]),
        channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_zero_opacity_leaves_base_untouched() {
        let mut base = solid(20, 20, [10, 20, 30, 255]);
        let overlay = solid(5, 5, [255, 255, 255, 255]);
        composite(&mut base, &overlay, Placement::new(2, 2), 0.0);
        assert!(base.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_full_opacity_opaque_overlay_replaces_pixels() {
        let mut base = solid(20, 20, [10, 20, 30, 255]);
        let overlay = solid(5, 5, [200, 100, 50, 255]);
        composite(&mut base, &overlay, Placement::new(2, 3), 1.0);

        assert_eq!(*base.get_pixel(2, 3), Rgba([200, 100, 50, 255]));
        assert_eq!(*base.get_pixel(6, 7), Rgba([200, 100, 50, 255]));
        assert_eq!(*base.get_pixel(7, 7), Rgba([10, 20, 30, 255]));
        assert_eq!(*base.get_pixel(1, 3), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_half_opacity_blends_evenly() {
        let blended = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(blended[3], 255);
        for c in 0..3 {
            assert!((127..=128).contains(&blended[c]), "channel {c} = {}", blended[c]);
        }
    }

    #[test]
    fn test_overlay_alpha_scales_with_opacity() {
        // 50% overlay alpha at 50% opacity contributes a quarter
        let blended = blend_over(Rgba([0, 0, 0, 255]), Rgba([200, 200, 200, 128]), 0.5);
        assert!((49..=51).contains(&blended[0]), "got {}", blended[0]);
    }

    #[test]
    fn test_negative_placement_is_clipped() {
        let mut base = solid(10, 10, [0, 0, 0, 255]);
        let overlay = solid(6, 6, [255, 0, 0, 255]);
        composite(&mut base, &overlay, Placement::new(-3, -3), 1.0);

        assert_eq!(*base.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*base.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*base.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_overlay_past_bottom_right_is_clipped() {
        let mut base = solid(10, 10, [0, 0, 0, 255]);
        let overlay = solid(6, 6, [0, 255, 0, 255]);
        composite(&mut base, &overlay, Placement::new(7, 8), 1.0);

        assert_eq!(*base.get_pixel(9, 9), Rgba([0, 255, 0, 255]));
        assert_eq!(*base.get_pixel(6, 9), Rgba([0, 0, 0, 255]));
    }
}
