//! JSON output for scripted runs
//!
//! When --json-progress is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// Watermarked file written
    FileCompleted {
        input_path: String,
        output_path: String,
        processing_time_ms: u128,
    },
    /// File skipped because of a per-file error
    FileSkipped { input_path: String, error: String },
    /// Run summary
    Summary {
        total_files: usize,
        processed: usize,
        skipped: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message, throttled to ~25 FPS.
    ///
    /// The final progress (current == total) is always emitted.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= 40 || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn file_completed(input_path: &Path, output_path: &Path, processing_time_ms: u128) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            processing_time_ms,
        }
        .emit();
    }

    pub fn file_skipped(input_path: &Path, error: impl Into<String>) {
        Self::FileSkipped {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }

    pub fn summary(total_files: usize, processed: usize, skipped: usize, duration_secs: f64) {
        Self::Summary {
            total_files,
            processed,
            skipped,
            duration_secs,
        }
        .emit();
    }
}
