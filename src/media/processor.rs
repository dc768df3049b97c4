use async_trait::async_trait;
use std::path::Path;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, TabiError};
use super::{MediaProcessorTrait, MediaCommand, MediaCommandBuilder, parse_duration};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_binary_path);

        Self { command_builder }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        if !media_path.exists() {
            return Err(TabiError::FileNotFound(media_path.display().to_string()));
        }

        let stdout = self.command_builder
            .probe_duration(media_path)
            .execute_capture()
            .await?;
        let duration = parse_duration(&stdout)?;

        debug!("Probed {}: {:.3}s", media_path.display(), duration);
        Ok(duration)
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder.version_check().execute().await
            .map_err(|e| TabiError::Media(format!("Media processor not found: {}", e)))?;
        self.command_builder.probe_version_check().execute().await
            .map_err(|e| TabiError::Media(format!("Media probe not found: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }

    async fn execute_command(&self, command: MediaCommand) -> Result<()> {
        info!("Executing media processing command: {}", command.description);
        command.execute().await
    }

    fn command(&self, description: &str) -> MediaCommand {
        self.command_builder.custom(description)
    }
}
