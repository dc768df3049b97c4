// Speech synthesis
//
// The Narrator owns voice selection and the synthesize-then-measure contract;
// engines only turn text into an audio file.
//
// To add a new speech engine:
// 1. Implement SpeechEngine for it
// 2. Add it to SpeechEngineFactory

pub mod espeak;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::NarratorConfig;
use crate::error::{Result, TabiError};
use crate::media::MediaProcessorTrait;

/// A voice offered by a speech engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier passed back to the engine
    pub id: String,
    /// Human readable name
    pub name: String,
}

/// Parameters for a single synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub voice: Option<String>,
    pub rate: u32,
}

/// Main trait for text-to-speech engines
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices the engine can speak with, in engine order
    async fn list_voices(&self) -> Result<Vec<Voice>>;

    /// Write speech for `text` to `output`; returns once the file is complete
    async fn synthesize(&self, text: &str, request: &SpeechRequest, output: &Path) -> Result<()>;

    /// Check if the engine is installed
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating speech engines
pub struct SpeechEngineFactory;

impl SpeechEngineFactory {
    pub fn create_default(config: &NarratorConfig) -> Box<dyn SpeechEngine> {
        Box::new(espeak::EspeakEngine::new(config.binary_path.clone()))
    }
}

/// Synthesized narration for one segment; the file is removed on drop
#[derive(Debug)]
pub struct NarrationAudio {
    pub segment_index: usize,
    pub path: TempPath,
    /// Measured playable length in seconds
    pub duration: f64,
}

impl NarrationAudio {
    /// Delete the audio file now, reporting failures
    pub fn close(self) -> Result<()> {
        self.path.close().map_err(TabiError::Io)
    }
}

/// First voice whose id or name contains one of the markers (case-insensitive)
pub fn select_voice<'a>(voices: &'a [Voice], markers: &[String]) -> Option<&'a Voice> {
    let markers: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();
    voices.iter().find(|voice| {
        let id = voice.id.to_lowercase();
        let name = voice.name.to_lowercase();
        markers.iter().any(|m| id.contains(m.as_str()) || name.contains(m.as_str()))
    })
}

pub struct Narrator {
    engine: Box<dyn SpeechEngine>,
    media: Arc<dyn MediaProcessorTrait>,
    config: NarratorConfig,
    voice: Option<Voice>,
}

impl Narrator {
    pub fn new(
        engine: Box<dyn SpeechEngine>,
        media: Arc<dyn MediaProcessorTrait>,
        config: NarratorConfig,
    ) -> Self {
        Self { engine, media, config, voice: None }
    }

    pub fn engine(&self) -> &dyn SpeechEngine {
        self.engine.as_ref()
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    /// Pick the voice for this run; the engine default is used when nothing matches
    pub async fn resolve_voice(&mut self) -> Option<&Voice> {
        match self.engine.list_voices().await {
            Ok(voices) => {
                self.voice = select_voice(&voices, &self.config.voice_markers).cloned();
                match &self.voice {
                    Some(voice) => info!("Narration voice: {} ({})", voice.name, voice.id),
                    None => warn!(
                        "No voice matches {:?}, using the engine default",
                        self.config.voice_markers
                    ),
                }
            }
            Err(e) => {
                warn!("Failed to list voices, using the engine default: {}", e);
                self.voice = None;
            }
        }
        self.voice.as_ref()
    }

    /// Synthesize `text` into a private temporary file, then measure it
    pub async fn synthesize(&self, segment_index: usize, text: &str) -> Result<NarrationAudio> {
        let path = tempfile::Builder::new()
            .prefix("tabi-narration-")
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();

        let request = SpeechRequest {
            voice: self.voice.as_ref().map(|v| v.id.clone()),
            rate: self.config.rate,
        };

        debug!("Synthesizing segment {} into {}", segment_index, path.display());
        self.engine.synthesize(text, &request, &path).await?;

        let duration = self.media.probe_duration(&path).await?;
        if duration <= 0.0 {
            return Err(TabiError::Speech(format!(
                "Segment {} produced no audio", segment_index
            )));
        }

        info!("Segment {} narration: {:.2}s", segment_index, duration);
        Ok(NarrationAudio { segment_index, path, duration })
    }
}
