//! Per-file error types.
//!
//! Every step of the per-image pipeline returns one of these. They are
//! recoverable: the offending file is logged and skipped, and the batch
//! moves on to the next file.
//!
//! The underlying error is rendered into the message rather than exposed as
//! a source, so chain-walking reports show it once.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("cannot read file: {0}")]
    Unreadable(io::Error),

    #[error("not a regular file")]
    NotAFile,

    #[error("file is empty")]
    EmptyFile,

    #[error("invalid image metadata: {0}")]
    InvalidMetadata(String),

    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    #[error("failed to build watermark overlay: {0}")]
    Overlay(String),

    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),

    #[error("failed to write output file: {0}")]
    Write(io::Error),
}
