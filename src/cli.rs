use clap::Parser;
use std::path::PathBuf;

use crate::watermark::discovery::DEFAULT_FILTER;
use crate::watermark::{Position, WatermarkSource};

#[derive(Parser, Debug)]
#[command(
    name = "batch-watermark",
    version,
    about = "Apply an image or text watermark to every image in a directory",
    long_about = "
Batch Watermark - Image Processor

Stamps a watermark onto every matching image in a directory and writes the
results, under their original file names and formats, to an output directory.
The watermark is either an image (scaled relative to each photo) or a piece of
text rendered white with a soft drop shadow.

Example Usage:
  # Text watermark in the bottom-right corner at 50% opacity
  batch-watermark -i ~/Photos -t \"© 2024 Studio\"

  # Logo watermark, top-left, 30% of the image width, fully opaque
  batch-watermark -i ~/Photos -o ~/stamped -w logo.png -p top-left -s 0.3 -a 1.0

  # Only PNG files whose name starts with 'shot'
  batch-watermark -i ~/Screens -t \"internal\" -f 'shot*.png'

  # See what would be written without touching the output directory
  batch-watermark -i ~/Photos -t \"draft\" --dry-run --verbose"
)]
pub struct Args {
    /// Directory containing the images to watermark
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Output directory for watermarked images
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = "./watermarked"
    )]
    pub output_dir: PathBuf,

    /// Watermark image file (PNG with transparency works best)
    #[arg(short = 'w', long = "watermark", value_name = "FILE", conflicts_with = "text")]
    pub watermark: Option<PathBuf>,

    /// Watermark text
    #[arg(short = 't', long = "text", value_name = "TEXT")]
    pub text: Option<String>,

    /// Watermark position: topleft, topright, bottomleft, bottomright or center.
    /// Unrecognised values fall back to center.
    #[arg(
        short = 'p',
        long = "position",
        default_value = "bottomright",
        value_name = "POSITION"
    )]
    pub position: String,

    /// Watermark opacity (0.0-1.0)
    #[arg(short = 'a', long = "opacity", default_value = "0.5", value_name = "OPACITY")]
    pub opacity: String,

    /// Watermark width relative to the image width (0.0-1.0)
    #[arg(short = 's', long = "scale", default_value = "0.2", value_name = "SCALE")]
    pub scale: String,

    /// Glob pattern selecting files inside the input directory; supports {a,b}
    #[arg(short = 'f', long = "filter", default_value = DEFAULT_FILTER, value_name = "GLOB")]
    pub filter: String,

    /// Font for text watermarks. Supports three formats:
    /// - Font name: "Arial" (searches system fonts)
    /// - Font filename: "Arial.ttf" (searches in font directories)
    /// - Path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf" (loads directly)
    #[arg(long = "font", default_value = "Arial", value_name = "FONT")]
    pub font: String,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Simulate the run: compose every image but write nothing
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Emit progress and results as JSON lines on stdout instead of human output
    #[arg(long = "json-progress")]
    pub json_progress: bool,
}

impl Args {
    /// Parse the opacity string into a value in 0.0..=1.0
    pub fn parse_opacity(&self) -> Result<f32, String> {
        let value = self
            .opacity
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("Invalid opacity: '{}'", self.opacity))?;

        if !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Opacity must be between 0.0 and 1.0, got: {}",
                self.opacity
            ));
        }
        Ok(value)
    }

    /// Parse the scale string into a value in 0.0..=1.0
    pub fn parse_scale(&self) -> Result<f64, String> {
        let value = self
            .scale
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid scale: '{}'", self.scale))?;

        if !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Scale must be between 0.0 and 1.0, got: {}",
                self.scale
            ));
        }
        Ok(value)
    }

    pub fn position(&self) -> Position {
        Position::parse_lossy(&self.position)
    }

    /// The configured watermark source, if exactly one was given.
    pub fn watermark_source(&self) -> Option<WatermarkSource> {
        match (&self.watermark, &self.text) {
            (Some(path), None) => Some(WatermarkSource::Image(path.clone())),
            (None, Some(text)) => Some(WatermarkSource::Text(text.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_command_line() {
        let args = Args::try_parse_from(["batch-watermark", "-i", "photos", "-t", "hello"]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("./watermarked"));
        assert_eq!(args.position(), Position::BottomRight);
        assert_eq!(args.parse_opacity().unwrap(), 0.5);
        assert_eq!(args.parse_scale().unwrap(), 0.2);
        assert_eq!(args.filter, DEFAULT_FILTER);
        assert!(matches!(
            args.watermark_source(),
            Some(WatermarkSource::Text(ref t)) if t == "hello"
        ));
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from([
            "batch-watermark", "-i", "in", "-o", "out", "-w", "logo.png", "-p", "top-left", "-a",
            "0.8", "-s", "0.3", "-f", "*.png",
        ])
        .unwrap();
        assert_eq!(args.position(), Position::TopLeft);
        assert_eq!(args.parse_opacity().unwrap(), 0.8);
        assert_eq!(args.parse_scale().unwrap(), 0.3);
        assert!(matches!(
            args.watermark_source(),
            Some(WatermarkSource::Image(ref p)) if p == &PathBuf::from("logo.png")
        ));
    }

    #[test]
    fn test_watermark_and_text_conflict() {
        let result = Args::try_parse_from([
            "batch-watermark", "-i", "in", "-w", "logo.png", "-t", "text",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_input_is_required() {
        assert!(Args::try_parse_from(["batch-watermark", "-t", "text"]).is_err());
    }

    #[test]
    fn test_no_source() {
        let args = Args {
            watermark: None,
            text: None,
            ..Default::default()
        };
        assert!(args.watermark_source().is_none());
    }

    #[test]
    fn test_parse_opacity_invalid() {
        for bad in ["abc", "1.5", "-0.1", "NaN", ""] {
            let args = Args {
                opacity: bad.to_string(),
                ..Default::default()
            };
            assert!(args.parse_opacity().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_scale_bounds() {
        for (raw, ok) in [("0", true), ("1", true), ("0.25", true), ("1.01", false), ("x", false)] {
            let args = Args {
                scale: raw.to_string(),
                ..Default::default()
            };
            assert_eq!(args.parse_scale().is_ok(), ok, "scale {raw:?}");
        }
    }

    #[test]
    fn test_unknown_position_is_center() {
        let args = Args {
            position: "somewhere".to_string(),
            ..Default::default()
        };
        assert_eq!(args.position(), Position::Center);
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./watermarked"),
            watermark: None,
            text: Some("© test".to_string()),
            position: "bottomright".to_string(),
            opacity: "0.5".to_string(),
            scale: "0.2".to_string(),
            filter: DEFAULT_FILTER.to_string(),
            font: "Arial".to_string(),
            verbose: false,
            dry_run: false,
            json_progress: false,
        }
    }
}
