// Media processing layer
//
// Everything that touches ffmpeg or ffprobe goes through here:
// - Commands: argument builders and process execution
// - Processor: the ffmpeg-backed implementation of MediaProcessorTrait

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Measure the playable duration of an audio or video file, in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Check if ffmpeg and ffprobe are available
    async fn check_availability(&self) -> Result<()>;

    /// Execute a prepared media processing command
    async fn execute_command(&self, command: MediaCommand) -> Result<()>;

    /// Start a command carrying this processor's ffmpeg binary
    fn command(&self, description: &str) -> MediaCommand;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
