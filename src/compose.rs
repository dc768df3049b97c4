//! One image, its caption and its narration combined into a timed clip.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::caption::CaptionOverlay;
use crate::config::RenderConfig;
use crate::error::{Result, TabiError};
use crate::media::format_seconds;
use crate::narrate::NarrationAudio;

/// Still image scaled to the frame height with its aspect ratio kept
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub path: PathBuf,
    pub source_width: u32,
    pub source_height: u32,
    /// Width after scaling, rounded to an even number for the encoder
    pub width: u32,
    pub height: u32,
    pub fade: f64,
}

impl ImageLayer {
    /// Read the image header and compute the scaled size
    pub fn load(path: &Path, frame_height: u32, fade: f64) -> Result<Self> {
        if !path.is_file() {
            return Err(TabiError::FileNotFound(path.display().to_string()));
        }

        let (source_width, source_height) = image::image_dimensions(path)?;
        if source_width == 0 || source_height == 0 {
            return Err(TabiError::Media(format!("Image {} has no pixels", path.display())));
        }

        Ok(Self {
            path: path.to_path_buf(),
            source_width,
            source_height,
            width: scaled_width(source_width, source_height, frame_height),
            height: frame_height,
            fade,
        })
    }
}

/// Width that keeps the aspect ratio at `height`, rounded down to even, at least 2
pub fn scaled_width(source_width: u32, source_height: u32, height: u32) -> u32 {
    let exact = source_width as f64 * height as f64 / source_height as f64;
    let rounded = exact.round() as u32;
    (rounded - rounded % 2).max(2)
}

/// A composed segment: image layer, optional caption and its own narration
#[derive(Debug)]
pub struct SegmentClip {
    pub index: usize,
    pub image: ImageLayer,
    pub caption: Option<CaptionOverlay>,
    pub audio: NarrationAudio,
    /// Narration length plus the trailing pad
    pub duration: f64,
}

impl SegmentClip {
    /// Video chain for this clip: scale, fades, caption, then center on the canvas
    pub fn video_filter(
        &self,
        input: usize,
        canvas_width: u32,
        fps: u32,
        pixel_format: &str,
        label: &str,
    ) -> String {
        let fade = self.image.fade.min(self.duration / 2.0);
        let fade_out_start = (self.duration - fade).max(0.0);

        let mut chain = vec![
            format!("scale={}:{}", self.image.width, self.image.height),
            "setsar=1".to_string(),
            format!("fade=t=in:st=0:d={}", format_seconds(fade)),
            format!("fade=t=out:st={}:d={}", format_seconds(fade_out_start), format_seconds(fade)),
        ];
        if let Some(caption) = &self.caption {
            chain.push(caption.drawtext_filter());
        }
        chain.push(format!(
            "pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black",
            canvas_width, self.image.height
        ));
        chain.push(format!("fps={}", fps));
        chain.push(format!("format={}", pixel_format));

        format!("[{}:v]{}[{}]", input, chain.join(","), label)
    }

    /// Audio chain for this clip: the narration followed by silence up to the clip length
    pub fn audio_filter(&self, input: usize, sample_rate: u32, label: &str) -> String {
        let duration = format_seconds(self.duration);
        format!(
            "[{}:a]aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo,apad=whole_dur={},atrim=0:{},asetpts=N/SR/TB[{}]",
            input, sample_rate, duration, duration, label
        )
    }
}

pub struct SegmentComposer {
    config: RenderConfig,
}

impl SegmentComposer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Length of the clip that will carry `audio`
    pub fn clip_duration(&self, audio: &NarrationAudio) -> f64 {
        audio.duration + self.config.trailing_pad_secs
    }

    /// Combine one image, an optional caption and the segment's narration.
    ///
    /// Image problems are fatal for the segment.
    pub fn compose(
        &self,
        image: &Path,
        caption: Option<CaptionOverlay>,
        audio: NarrationAudio,
    ) -> Result<SegmentClip> {
        let layer = ImageLayer::load(image, self.config.height, self.config.image_fade_secs)?;
        let duration = self.clip_duration(&audio);

        // The caption lives exactly as long as its clip
        let caption = caption.map(|mut overlay| {
            overlay.duration = duration;
            overlay
        });

        debug!(
            "Segment {}: {} ({}x{} -> {}x{}), {:.2}s, caption: {}",
            audio.segment_index,
            layer.path.display(),
            layer.source_width,
            layer.source_height,
            layer.width,
            layer.height,
            duration,
            caption.is_some()
        );

        Ok(SegmentClip {
            index: audio.segment_index,
            image: layer,
            caption,
            audio,
            duration,
        })
    }
}
