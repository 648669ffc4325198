use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use std::time::{Duration, Instant};

use batch_watermark::cli::Args;
use batch_watermark::utils::{
    build_config, create_progress_bar, create_spinner, format_duration, verbose_println,
    warn_println, ProcessingStats,
};
use batch_watermark::{JsonMessage, WatermarkConfig, WatermarkEngine, WatermarkSource};

fn print_configuration(config: &WatermarkConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Input directory: {}", config.input_dir.display());
    println!("  Output directory: {}", config.output_dir.display());
    match &config.source {
        WatermarkSource::Image(path) => println!("  Watermark image: {}", path.display()),
        WatermarkSource::Text(text) => {
            println!("  Watermark text: {:?}", text);
            println!("  Font: {}", config.font_name);
        }
    }
    println!("  Position: {}", config.position);
    println!("  Opacity: {}", config.opacity);
    println!("  Scale: {}", config.scale);
    println!("  Filter: {}", config.filter);
    if config.dry_run {
        println!("  Dry run mode: enabled (simulation only - no files will be created)");
    }
    println!();
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let args = Args::parse();
    let json_mode = args.json_progress;

    if !json_mode {
        println!("{}", style("Batch Watermark - Image Processor").bold().blue());
        println!("{}", style("Sequential image and text watermarking").dim());
        println!();
    }

    // Nothing beyond the input directory is touched until arguments are valid
    let config = build_config(&args)?;

    if config.verbose && !json_mode {
        print_configuration(&config);
    }

    // Loads the watermark image or font; failing here aborts the run
    let mut engine = WatermarkEngine::new(config)?;

    if !engine.config().dry_run {
        std::fs::create_dir_all(&args.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                args.output_dir.display()
            )
        })?;
    } else {
        verbose_println(
            args.verbose && !json_mode,
            "Dry run mode: Skipping output directory creation",
        );
    }

    let discovery = if json_mode {
        ProgressBar::hidden()
    } else {
        create_spinner("Scanning input directory...")
    };
    let image_files = discovery.suspend(|| engine.discover_images())?;
    discovery.finish_with_message(format!("✓ Found {} images", image_files.len()));

    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(0, 0, 0, start_time.elapsed().as_secs_f64());
        } else {
            warn_println(&format!(
                "No images matching '{}' found in {}",
                args.filter,
                args.input_dir.display()
            ));
        }
        return Ok(());
    }

    let main_progress = if json_mode {
        ProgressBar::hidden()
    } else {
        create_progress_bar(image_files.len() as u64)
    };
    main_progress.set_message("Processing images");

    let outcomes = engine.process_batch(&image_files, &main_progress);
    main_progress.finish_with_message("✓ Processing complete!");

    let total_time = start_time.elapsed();
    let processing_time: Duration = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|r| r.processing_time)
        .sum();
    let stats = ProcessingStats::from_outcomes(&outcomes, processing_time);

    if json_mode {
        JsonMessage::summary(
            stats.total_files,
            stats.successful,
            stats.skipped,
            total_time.as_secs_f64(),
        );
        return Ok(());
    }

    let dry_run_mode = engine.config().dry_run;

    println!();
    let header = if dry_run_mode {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    println!("  Images found: {}", style(stats.total_files).bold());
    let processed_label = if dry_run_mode {
        "Would be processed"
    } else {
        "Successfully processed"
    };
    println!(
        "  {}: {}",
        processed_label,
        style(stats.successful).bold().green()
    );
    if stats.skipped > 0 {
        println!("  Skipped: {}", style(stats.skipped).bold().yellow());
    }
    println!("  Success rate: {:.1}%", stats.success_rate());

    if stats.skipped > 0 {
        println!();
        println!("{}", style("Skipped files:").bold().yellow());
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                println!(
                    "  {} {}: {}",
                    style("✗").red(),
                    outcome.input_path.display(),
                    e
                );
            }
        }
    }

    if args.verbose && stats.successful > 0 {
        println!();
        let detailed_header = if dry_run_mode {
            style("Detailed Simulation Results:").bold().blue()
        } else {
            style("Detailed Processing Results:").bold().blue()
        };
        println!("{}", detailed_header);
        for processed in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
            println!(
                "  {} {} -> {} (overlay {}x{}, {})",
                style("✓").green(),
                processed.input_path.display(),
                processed.output_path.display(),
                processed.overlay_dimensions.0,
                processed.overlay_dimensions.1,
                format_duration(processed.processing_time)
            );
        }
    }

    println!();
    println!(
        "  Total time: {}",
        style(format_duration(total_time)).bold()
    );
    if stats.successful > 0 {
        println!(
            "  Average per image: {}",
            style(format_duration(stats.average_duration())).dim()
        );
    }
    if !dry_run_mode {
        println!("  Output: {}", style(args.output_dir.display()).cyan());
    }

    Ok(())
}
