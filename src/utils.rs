use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::Args;
use crate::watermark::{FileOutcome, WatermarkConfig};

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    ) {
        pb.set_style(bar_style.progress_chars("#>-"));
    }
    pb
}

/// Spinner shown while the input directory is scanned
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments.
///
/// Checks run in a fixed order and touch nothing on disk besides the input
/// directory, so a bad invocation never creates the output directory.
pub fn validate_inputs(args: &Args) -> Result<()> {
    if !args.input_dir.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            args.input_dir.display()
        ));
    }
    if !args.input_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Input path is not a directory: {}",
            args.input_dir.display()
        ));
    }

    match (&args.watermark, &args.text) {
        (None, None) => {
            return Err(anyhow::anyhow!(
                "Either --watermark or --text must be specified"
            ))
        }
        (Some(_), Some(_)) => {
            return Err(anyhow::anyhow!(
                "Only one of --watermark or --text can be specified"
            ))
        }
        _ => {}
    }

    args.parse_opacity().map_err(|e| anyhow::anyhow!(e))?;
    args.parse_scale().map_err(|e| anyhow::anyhow!(e))?;

    if args.filter.trim().is_empty() {
        return Err(anyhow::anyhow!("Filter pattern must not be empty"));
    }

    Ok(())
}

/// Turn validated arguments into the engine configuration
pub fn build_config(args: &Args) -> Result<WatermarkConfig> {
    validate_inputs(args)?;

    let source = args
        .watermark_source()
        .ok_or_else(|| anyhow::anyhow!("Either --watermark or --text must be specified"))?;

    Ok(WatermarkConfig {
        input_dir: args.input_dir.clone(),
        output_dir: args.output_dir.clone(),
        source,
        position: args.position(),
        opacity: args.parse_opacity().map_err(|e| anyhow::anyhow!(e))?,
        scale: args.parse_scale().map_err(|e| anyhow::anyhow!(e))?,
        filter: args.filter.clone(),
        font_name: args.font.clone(),
        verbose: args.verbose,
        dry_run: args.dry_run,
        json_progress: args.json_progress,
    })
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Calculate processing statistics
#[derive(Debug)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub successful: usize,
    pub skipped: usize,
    pub total_duration: Duration,
}

impl ProcessingStats {
    pub fn from_outcomes(outcomes: &[FileOutcome], total_duration: Duration) -> Self {
        let successful = outcomes.iter().filter(|o| o.result.is_ok()).count();
        Self {
            total_files: outcomes.len(),
            successful,
            skipped: outcomes.len() - successful,
            total_duration,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.successful == 0 {
            Duration::new(0, 0)
        } else {
            self.total_duration / self.successful as u32
        }
    }
}
