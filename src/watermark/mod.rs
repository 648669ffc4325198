pub mod compositor;
pub mod discovery;
pub mod error;
pub mod overlay;
pub mod position;
pub mod text;

use ab_glyph::FontVec;
use anyhow::Result;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use indicatif::ProgressBar;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use error::WatermarkError;
pub use position::{calculate_placement, Placement, Position};

use crate::json_output::JsonMessage;
use crate::utils::{error_println, verbose_println};

/// Where the watermark comes from. Exactly one source per run.
#[derive(Debug, Clone)]
pub enum WatermarkSource {
    Image(PathBuf),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source: WatermarkSource,
    pub position: Position,
    pub opacity: f32,
    pub scale: f64,
    pub filter: String,
    pub font_name: String,
    pub verbose: bool,
    pub dry_run: bool,
    pub json_progress: bool,
}

/// Loaded watermark material, prepared once per run.
enum OverlaySource {
    /// Decoded watermark plus its resized variants keyed by target width.
    Image {
        original: RgbaImage,
        resized: HashMap<u32, RgbaImage>,
    },
    /// Text is re-rendered per image since its size follows the base image.
    Text { font: FontVec, text: String },
}

pub struct WatermarkEngine {
    config: WatermarkConfig,
    overlay: OverlaySource,
}

impl WatermarkEngine {
    /// Prepare the engine: decode the watermark image or load the font.
    ///
    /// Failures here are fatal for the run since no file could be
    /// watermarked without them.
    pub fn new(config: WatermarkConfig) -> Result<Self> {
        let overlay = match &config.source {
            WatermarkSource::Image(path) => {
                let original = overlay::load_watermark_image(path)?;
                verbose_println(
                    config.verbose && !config.json_progress,
                    &format!(
                        "Loaded watermark {} ({}x{})",
                        path.display(),
                        original.width(),
                        original.height()
                    ),
                );
                OverlaySource::Image {
                    original,
                    resized: HashMap::new(),
                }
            }
            WatermarkSource::Text(text) => {
                if text.trim().is_empty() {
                    return Err(anyhow::anyhow!("Watermark text must not be empty"));
                }
                let font = text::load_font(&config.font_name)?;
                OverlaySource::Text {
                    font,
                    text: text.clone(),
                }
            }
        };

        Ok(Self { config, overlay })
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Discover all image files in the input directory
    pub fn discover_images(&self) -> Result<Vec<PathBuf>> {
        verbose_println(
            self.config.verbose && !self.config.json_progress,
            &format!(
                "Scanning {} with filter '{}'",
                self.config.input_dir.display(),
                self.config.filter
            ),
        );

        let files = discovery::discover_images(&self.config.input_dir, &self.config.filter)?;

        verbose_println(
            self.config.verbose && !self.config.json_progress,
            &format!("Found {} image files", files.len()),
        );
        Ok(files)
    }

    /// Watermark every file in order, one at a time.
    ///
    /// A failing file is logged and skipped; it never stops the batch.
    pub fn process_batch(&mut self, image_files: &[PathBuf], progress: &ProgressBar) -> Vec<FileOutcome> {
        let total = image_files.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, input_path) in image_files.iter().enumerate() {
            let filename = display_name(input_path);
            progress.set_message(format!("Processing {}", filename));

            let result = self.process_single_image(input_path);

            match &result {
                Ok(processed) => {
                    if self.config.json_progress {
                        JsonMessage::file_completed(
                            &processed.input_path,
                            &processed.output_path,
                            processed.processing_time.as_millis(),
                        );
                    } else {
                        progress.suspend(|| {
                            verbose_println(
                                self.config.verbose,
                                &format!(
                                    "{} ({}x{}) -> {} at ({}, {})",
                                    filename,
                                    processed.base_dimensions.0,
                                    processed.base_dimensions.1,
                                    processed.output_path.display(),
                                    processed.placement.left,
                                    processed.placement.top
                                ),
                            )
                        });
                    }
                }
                Err(e) => {
                    if self.config.json_progress {
                        JsonMessage::file_skipped(input_path, e.to_string());
                    } else {
                        progress.suspend(|| error_println(&format!("{}: {}", filename, e)));
                    }
                }
            }

            if self.config.json_progress {
                JsonMessage::progress(index + 1, total, format!("Processed {}", filename));
            }
            progress.inc(1);

            outcomes.push(FileOutcome {
                input_path: input_path.clone(),
                result,
            });
        }

        outcomes
    }

    /// Watermark a single file and write it to the output directory.
    pub fn process_single_image(&mut self, input_path: &Path) -> Result<ProcessingResult, WatermarkError> {
        let start = Instant::now();

        check_source_file(input_path)?;
        let (format, base_width, base_height) = read_metadata(input_path)?;

        let scale = self.config.scale;
        let overlay = build_overlay(&mut self.overlay, scale, base_width, base_height)?;

        let placement = calculate_placement(
            self.config.position,
            base_width,
            base_height,
            overlay.width(),
            overlay.height(),
        );

        let base = ImageReader::open(input_path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(WatermarkError::Unreadable)?
            .decode()
            .map_err(WatermarkError::Decode)?;

        let keep_alpha = base.color().has_alpha();
        let mut canvas = base.into_rgba8();
        compositor::composite(&mut canvas, &overlay, placement, self.config.opacity);

        let output = if keep_alpha {
            DynamicImage::ImageRgba8(canvas)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).into_rgb8())
        };

        let encoded = encode(&output, format)?;

        let file_name = input_path.file_name().ok_or(WatermarkError::NotAFile)?;
        let output_path = self.config.output_dir.join(file_name);

        if !self.config.dry_run {
            write_atomically(&output_path, &encoded)?;
        }

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path,
            base_dimensions: (base_width, base_height),
            overlay_dimensions: overlay.dimensions(),
            placement,
            processing_time: start.elapsed(),
        })
    }
}

/// Produce the overlay for one base image.
fn build_overlay(
    source: &mut OverlaySource,
    scale: f64,
    base_width: u32,
    base_height: u32,
) -> Result<Cow<'_, RgbaImage>, WatermarkError> {
    match source {
        OverlaySource::Image { original, resized } => {
            let target_width = overlay::target_overlay_width(base_width, scale);
            if !resized.contains_key(&target_width) {
                let image = overlay::resize_watermark(original, target_width)?;
                resized.insert(target_width, image);
            }
            Ok(Cow::Borrowed(&resized[&target_width]))
        }
        OverlaySource::Text { font, text } => {
            text::render_text_overlay(font, text, base_width, base_height, scale).map(Cow::Owned)
        }
    }
}

/// The path must be a readable, non-empty regular file.
fn check_source_file(path: &Path) -> Result<(), WatermarkError> {
    let metadata = fs::metadata(path).map_err(WatermarkError::Unreadable)?;
    if !metadata.is_file() {
        return Err(WatermarkError::NotAFile);
    }
    if metadata.len() == 0 {
        return Err(WatermarkError::EmptyFile);
    }
    fs::File::open(path).map_err(WatermarkError::Unreadable)?;
    Ok(())
}

/// Format and dimensions, read from the header without a full decode.
fn read_metadata(path: &Path) -> Result<(ImageFormat, u32, u32), WatermarkError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(WatermarkError::Unreadable)?;

    let format = reader
        .format()
        .ok_or_else(|| WatermarkError::InvalidMetadata("unrecognised image format".to_string()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| WatermarkError::InvalidMetadata(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(WatermarkError::InvalidMetadata(format!(
            "image has no area ({}x{})",
            width, height
        )));
    }

    Ok((format, width, height))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, WatermarkError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(WatermarkError::Encode)?;
    Ok(bytes)
}

/// Write `bytes` to a temporary file next to `path`, then rename it over
/// `path`. An existing file at `path` is untouched unless the rename succeeds.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), WatermarkError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".watermark-")
        .tempfile_in(dir)
        .map_err(WatermarkError::Write)?;
    staged.write_all(bytes).map_err(WatermarkError::Write)?;
    staged.as_file().sync_all().map_err(WatermarkError::Write)?;

    // Temp files are created owner-only; outputs get the usual mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(WatermarkError::Write)?;
    }

    staged
        .persist(path)
        .map_err(|e| WatermarkError::Write(e.error))?;
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Result of processing one file, successful or not.
#[derive(Debug)]
pub struct FileOutcome {
    pub input_path: PathBuf,
    pub result: Result<ProcessingResult, WatermarkError>,
}

#[derive(Debug)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub base_dimensions: (u32, u32),
    pub overlay_dimensions: (u32, u32),
    pub placement: Placement,
    pub processing_time: Duration,
}
