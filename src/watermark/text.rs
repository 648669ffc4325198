use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use std::path::{Path, PathBuf};

use super::compositor::blend_over;
use super::error::WatermarkError;

/// Smallest font size ever rendered, in pixels.
pub const MIN_FONT_SIZE: f64 = 12.0;

/// Smallest edge of the box the text is fitted into, in pixels.
pub const MIN_BOX_EDGE: f64 = 50.0;

/// Shadow alpha relative to full coverage.
const SHADOW_ALPHA: f32 = 0.5;

/// Font size and canvas size for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub font_size: f64,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

/// Bounding box the text should fit in for a given base image.
pub fn text_box(base_width: u32, base_height: u32, scale: f64) -> (f64, f64) {
    let width = (base_width as f64 * scale).max(MIN_BOX_EDGE);
    let height = (base_height as f64 * 0.6).max(MIN_BOX_EDGE);
    (width, height)
}

/// Size the font and canvas for `text` inside a `width` x `height` box.
///
/// The constants are empirical and tuned for visual balance; keep them as
/// they are so output stays comparable between releases.
pub fn compute_text_layout(text: &str, width: f64, height: f64) -> TextLayout {
    let length = text.chars().count().max(1) as f64;

    let mut font_size = (width / 5.0).min(height / 1.2).floor();

    if length > 8.0 {
        font_size *= (8.0 / length).min(1.0) * 1.5;
    }

    font_size = font_size.min((width / (length * 0.6)).min(height * 0.9));
    font_size = font_size.max(MIN_FONT_SIZE);

    let canvas_width = width.max(font_size * length * 0.7);
    let canvas_height = height.min(font_size * 1.3).max(font_size * 1.2);

    TextLayout {
        font_size,
        canvas_width: canvas_width.round() as u32,
        canvas_height: canvas_height.round() as u32,
    }
}

/// Render `text` as a white, drop-shadowed overlay for a base image.
///
/// The text is centered on both axes of a canvas sized by
/// [`compute_text_layout`]; everything outside the glyphs and their shadow
/// is fully transparent.
pub fn render_text_overlay(
    font: &FontVec,
    text: &str,
    base_width: u32,
    base_height: u32,
    scale: f64,
) -> Result<RgbaImage, WatermarkError> {
    if text.trim().is_empty() {
        return Err(WatermarkError::Overlay("watermark text is empty".to_string()));
    }

    let (box_w, box_h) = text_box(base_width, base_height, scale);
    let layout = compute_text_layout(text, box_w, box_h);

    let px_scale = em_scale(font, layout.font_size as f32);
    let scaled = font.as_scaled(px_scale);

    let text_width = measure_advance(font, px_scale, text);
    let text_height = scaled.ascent() - scaled.descent();

    let origin_x = (layout.canvas_width as f32 - text_width) / 2.0;
    let baseline = (layout.canvas_height as f32 - text_height) / 2.0 + scaled.ascent();

    let coverage = rasterize(
        font,
        px_scale,
        text,
        origin_x,
        baseline,
        layout.canvas_width,
        layout.canvas_height,
    );

    let shadow_offset = (layout.font_size as f32 / 20.0).max(1.0);
    let shadow = gaussian_blur_f32(&coverage, shadow_offset);
    let dx = shadow_offset.round() as u32;
    let dy = dx;

    let mut canvas = RgbaImage::new(layout.canvas_width, layout.canvas_height);
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        if x >= dx && y >= dy {
            let shadow_cov = shadow.get_pixel(x - dx, y - dy)[0] as f32;
            if shadow_cov > 0.0 {
                let alpha = (shadow_cov * SHADOW_ALPHA).round() as u8;
                *pixel = blend_over(*pixel, Rgba([0, 0, 0, alpha]), 1.0);
            }
        }

        let text_cov = coverage.get_pixel(x, y)[0];
        if text_cov > 0 {
            *pixel = blend_over(*pixel, Rgba([255, 255, 255, text_cov]), 1.0);
        }
    }

    Ok(canvas)
}

/// Scale at which one em of `font` spans `font_size` pixels.
///
/// `PxScale` measures ascent to descent, which is taller than the em box for
/// most fonts.
fn em_scale(font: &FontVec, font_size: f32) -> PxScale {
    match font.units_per_em() {
        Some(units_per_em) if units_per_em > 0.0 => {
            PxScale::from(font_size * font.height_unscaled() / units_per_em)
        }
        _ => PxScale::from(font_size),
    }
}

/// Horizontal advance of `text`, including kerning.
fn measure_advance(font: &FontVec, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut prev = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    width
}

/// Rasterize glyph coverage into a single-channel mask.
fn rasterize(
    font: &FontVec,
    scale: PxScale,
    text: &str,
    origin_x: f32,
    baseline: f32,
    width: u32,
    height: u32,
) -> GrayImage {
    let scaled = font.as_scaled(scale);
    let mut mask = GrayImage::new(width, height);

    let mut caret = origin_x;
    let mut prev = None;

    for c in text.chars() {
        let mut glyph = scaled.scaled_glyph(c);
        if let Some(prev) = prev {
            caret += scaled.kern(prev, glyph.id);
        }
        glyph.position = point(caret, baseline);
        caret += scaled.h_advance(glyph.id);
        prev = Some(glyph.id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();

        outlined.draw(|gx, gy, cov| {
            let x = gx as i64 + bounds.min.x as i64;
            let y = gy as i64 + bounds.min.y as i64;
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                return;
            }

            let value = (cov.clamp(0.0, 1.0) * 255.0).round() as u8;
            let existing = mask.get_pixel(x as u32, y as u32)[0];
            if value > existing {
                mask.put_pixel(x as u32, y as u32, Luma([value]));
            }
        });
    }

    mask
}

/// Load a font from a font specification.
///
/// Accepted forms:
/// 1. Path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf" or "fonts/Mine.otf"
/// 2. Font filename: "Arial.ttf", searched in the system font directories
/// 3. Family name: "Arial", "DejaVu Sans"
///
/// Falls back to a list of widely installed sans-serif fonts when the
/// requested one cannot be found.
pub fn load_font(font_spec: &str) -> Result<FontVec> {
    if looks_like_path(font_spec) {
        return load_font_from_path(Path::new(font_spec));
    }

    let fallback = fallback_font_paths();
    font_candidates(font_spec)
        .into_iter()
        .chain(fallback)
        .filter(|path| path.is_file())
        .find_map(|path| load_font_from_path(&path).ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No suitable fonts found for '{}'. Install a system font or pass --font with a path to a .ttf/.otf file.",
                font_spec
            )
        })
}

fn looks_like_path(font_spec: &str) -> bool {
    Path::new(font_spec).is_absolute() || font_spec.contains('/') || font_spec.contains('\\')
}

fn is_font_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    [".ttf", ".otf", ".ttc"].iter().any(|ext| lower.ends_with(ext))
}

fn load_font_from_path(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read font file: {}", path.display()))?;
    FontVec::try_from_vec(data)
        .with_context(|| format!("Failed to parse font file: {}", path.display()))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn system_font_directories() -> Vec<PathBuf> {
    [
        // macOS
        "/System/Library/Fonts",
        "/System/Library/Fonts/Supplemental",
        "/Library/Fonts",
        "~/Library/Fonts",
        // Linux
        "/usr/share/fonts",
        "/usr/share/fonts/truetype",
        "/usr/share/fonts/TTF",
        "/usr/share/fonts/opentype",
        "/usr/local/share/fonts",
        "~/.fonts",
        "~/.local/share/fonts",
        // Windows (native and WSL)
        "C:\\Windows\\Fonts",
        "/mnt/c/Windows/Fonts",
    ]
    .iter()
    .map(|dir| expand_home(dir))
    .collect()
}

/// Candidate files for a font filename or family name, most specific first.
fn font_candidates(font_spec: &str) -> Vec<PathBuf> {
    let dirs = system_font_directories();

    if is_font_filename(font_spec) {
        return dirs.iter().map(|dir| dir.join(font_spec)).collect();
    }

    let compact: String = font_spec.chars().filter(|c| !c.is_whitespace()).collect();
    let family_dir = font_spec
        .split_whitespace()
        .next()
        .unwrap_or(font_spec)
        .to_lowercase();

    let mut candidates = Vec::new();
    for dir in &dirs {
        for ext in ["ttf", "otf", "ttc"] {
            candidates.push(dir.join(format!("{}.{}", font_spec, ext)));
            candidates.push(dir.join(format!("{}.{}", compact, ext)));
            candidates.push(dir.join(&family_dir).join(format!("{}.{}", compact, ext)));
        }
    }
    candidates
}

fn fallback_font_paths() -> Vec<PathBuf> {
    [
        "/System/Library/Fonts/Helvetica.ttc",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
        "/mnt/c/Windows/Fonts/arial.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_for_short_text() {
        // 500x300 base at the default scale of 0.2
        let (w, h) = text_box(500, 300, 0.2);
        assert_eq!((w, h), (100.0, 180.0));

        let layout = compute_text_layout("© 2024", w, h);
        assert_eq!(layout.font_size, 20.0);
        assert_eq!(layout.canvas_width, 100);
        assert_eq!(layout.canvas_height, 26);
    }

    #[test]
    fn test_layout_for_long_text_hits_minimum() {
        let layout = compute_text_layout("Copyright Example Corporation", 100.0, 180.0);
        assert_eq!(layout.font_size, MIN_FONT_SIZE);
        // 12 * 29 * 0.7 = 243.6
        assert_eq!(layout.canvas_width, 244);
        // max(min(180, 15.6), 14.4) = 15.6
        assert_eq!(layout.canvas_height, 16);
    }

    #[test]
    fn test_layout_shrinks_text_longer_than_eight_chars() {
        // candidate floor(min(400/5, 600/1.2)) = 80, shrunk by (8/10)*1.5 = 1.2 -> 96,
        // then capped at min(400/6, 540) = 66.67
        let layout = compute_text_layout("abcdefghij", 400.0, 600.0);
        assert!((layout.font_size - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_box_uses_minimum_edges() {
        let (w, h) = text_box(20, 10, 0.2);
        assert_eq!((w, h), (MIN_BOX_EDGE, MIN_BOX_EDGE));
    }

    #[test]
    fn test_font_size_never_below_minimum() {
        let long = "x".repeat(500);
        for text in ["a", "ab", "watermark", long.as_str()] {
            for (w, h) in [(50.0, 50.0), (51.0, 73.0), (1000.0, 50.0), (50.0, 4000.0)] {
                let layout = compute_text_layout(text, w, h);
                assert!(layout.font_size >= MIN_FONT_SIZE, "{text:?} in {w}x{h}");
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let a = compute_text_layout("Sample Studio 2024", 321.0, 456.0);
        let b = compute_text_layout("Sample Studio 2024", 321.0, 456.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_layout_counts_chars_not_bytes() {
        // "©" is two bytes but one character
        let ascii = compute_text_layout("c 2024", 100.0, 180.0);
        let unicode = compute_text_layout("© 2024", 100.0, 180.0);
        assert_eq!(ascii, unicode);
    }

    #[test]
    fn test_is_font_filename() {
        assert!(is_font_filename("Arial.ttf"));
        assert!(is_font_filename("Arial.TTF"));
        assert!(is_font_filename("Helvetica.ttc"));
        assert!(is_font_filename("Inter.otf"));
        assert!(!is_font_filename("Arial"));
        assert!(!is_font_filename("notes.txt"));
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("/usr/share/fonts/a.ttf"));
        assert!(looks_like_path("fonts/a.ttf"));
        assert!(!looks_like_path("Arial"));
        assert!(!looks_like_path("DejaVu Sans"));
    }

    #[test]
    fn test_family_name_candidates() {
        let candidates = font_candidates("DejaVu Sans");
        assert!(candidates.contains(&PathBuf::from(
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
        )));
    }

    fn system_font() -> FontVec {
        fallback_font_paths()
            .into_iter()
            .filter(|path| path.is_file())
            .find_map(|path| load_font_from_path(&path).ok())
            .expect("a system font is required for rendering tests")
    }

    #[test]
    fn test_em_scale_matches_font_size() {
        let font = system_font();
        let units_per_em = font.units_per_em().unwrap();

        for font_size in [12.0f32, 20.0, 66.5] {
            let scaled = font.as_scaled(em_scale(&font, font_size));
            let em = scaled.h_scale_factor() * units_per_em;
            assert!((em - font_size).abs() < 1e-3, "em {em} for font size {font_size}");
        }
    }

    #[test]
    fn test_rendered_glyph_height_follows_em_size() {
        let font = system_font();
        let font_size = 40.0f32;
        let scale = em_scale(&font, font_size);

        // Cap height of 'H' in em units, taken from the outline itself
        let id = font.glyph_id('H');
        let outline = font.outline(id).unwrap();
        let cap_height_em = (outline.bounds.max.y - outline.bounds.min.y) / font.units_per_em().unwrap();

        let mask = rasterize(&font, scale, "H", 10.0, 60.0, 100, 100);
        let rows: Vec<u32> = (0..mask.height())
            .filter(|&y| (0..mask.width()).any(|x| mask.get_pixel(x, y)[0] > 127))
            .collect();
        let ink_height = (rows[rows.len() - 1] - rows[0] + 1) as f32;

        assert!(
            (ink_height - cap_height_em * font_size).abs() <= 1.5,
            "ink height {ink_height}, expected {}",
            cap_height_em * font_size
        );
    }

    #[test]
    fn test_text_overlay_has_layout_canvas() {
        let font = system_font();
        let overlay = render_text_overlay(&font, "© 2024", 500, 300, 0.2).unwrap();
        assert_eq!(overlay.dimensions(), (100, 26));
        // Glyph interiors are opaque white
        assert!(overlay.pixels().any(|p| p[3] >= 240 && p[0] >= 240));
        assert!(overlay.pixels().any(|p| p[3] == 0));
    }

    #[test]
    fn test_missing_font_path_is_an_error() {
        assert!(load_font("/definitely/not/here.ttf").is_err());
    }
}
