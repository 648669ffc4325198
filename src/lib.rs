// Library exports for the binary and integration tests
pub mod cli;
pub mod json_output;
pub mod utils;
pub mod watermark;

// Re-export commonly used types
pub use json_output::JsonMessage;
pub use watermark::{
    FileOutcome, Position, ProcessingResult, WatermarkConfig, WatermarkEngine, WatermarkError,
    WatermarkSource,
};
