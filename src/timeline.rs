//! Ordered clips joined end to end, with an optional background music bed.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::compose::SegmentClip;
use crate::config::RenderConfig;
use crate::error::{Result, TabiError};
use crate::media::format_seconds;
use crate::narrate::NarrationAudio;

/// Background music stretched under the whole timeline
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundBed {
    pub path: PathBuf,
    pub volume: f64,
    /// Always the timeline length, whatever the length of the music file
    pub duration: f64,
}

/// A filter graph together with the output label to map
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub graph: String,
    pub output: String,
}

impl FilterGraph {
    /// Output label in `-map` form
    pub fn map_label(&self) -> String {
        format!("[{}]", self.output)
    }
}

#[derive(Debug)]
pub struct Timeline {
    clips: Vec<SegmentClip>,
    background: Option<BackgroundBed>,
    /// Width of the widest scaled image; narrower clips are centered on it
    canvas_width: u32,
    height: u32,
    fps: u32,
    pixel_format: String,
    sample_rate: u32,
}

impl Timeline {
    pub fn clips(&self) -> &[SegmentClip] {
        &self.clips
    }

    pub fn background(&self) -> Option<&BackgroundBed> {
        self.background.as_ref()
    }

    pub fn canvas_width(&self) -> u32 {
        self.canvas_width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sum of the clip durations
    pub fn duration(&self) -> f64 {
        self.clips.iter().map(|clip| clip.duration).sum()
    }

    /// Narration files in segment order, for cleanup after export
    pub fn into_narrations(self) -> Vec<NarrationAudio> {
        self.clips.into_iter().map(|clip| clip.audio).collect()
    }

    /// Audio graph over inputs `0..n` (narrations) and, with a bed, input `n` (music)
    pub fn audio_graph(&self) -> FilterGraph {
        let mut chains: Vec<String> = self.clips
            .iter()
            .enumerate()
            .map(|(i, clip)| clip.audio_filter(i, self.sample_rate, &format!("a{}", i)))
            .collect();

        let labels: String = (0..self.clips.len()).map(|i| format!("[a{}]", i)).collect();
        chains.push(format!("{}concat=n={}:v=0:a=1[narration]", labels, self.clips.len()));

        let output = match &self.background {
            Some(bed) => {
                let total = format_seconds(bed.duration);
                chains.push(format!(
                    "[{}:a]aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo,volume={},atrim=0:{},asetpts=N/SR/TB[bgm]",
                    self.clips.len(), self.sample_rate, bed.volume, total
                ));
                chains.push(
                    "[narration][bgm]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[mix]"
                        .to_string(),
                );
                "mix"
            }
            None => "narration",
        };

        FilterGraph { graph: chains.join(";"), output: output.to_string() }
    }

    /// Video graph over inputs `0..n` (looped images)
    pub fn video_graph(&self) -> FilterGraph {
        let mut chains: Vec<String> = self.clips
            .iter()
            .enumerate()
            .map(|(i, clip)| {
                clip.video_filter(i, self.canvas_width, self.fps, &self.pixel_format, &format!("v{}", i))
            })
            .collect();

        let labels: String = (0..self.clips.len()).map(|i| format!("[v{}]", i)).collect();
        chains.push(format!("{}concat=n={}:v=1:a=0[video]", labels, self.clips.len()));

        FilterGraph { graph: chains.join(";"), output: "video".to_string() }
    }
}

pub struct TimelineAssembler {
    config: RenderConfig,
}

impl TimelineAssembler {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Join clips in order and lay music under them when the file exists
    pub fn assemble(&self, clips: Vec<SegmentClip>, bgm: Option<&Path>) -> Result<Timeline> {
        if clips.is_empty() {
            return Err(TabiError::Precondition("Nothing to assemble: no clips".to_string()));
        }

        let canvas_width = clips.iter().map(|clip| clip.image.width).max().unwrap_or(self.config.width);
        let duration: f64 = clips.iter().map(|clip| clip.duration).sum();

        let background = match bgm {
            Some(path) if path.is_file() => {
                info!("Background music: {} at volume {}", path.display(), self.config.bgm_volume);
                Some(BackgroundBed {
                    path: path.to_path_buf(),
                    volume: self.config.bgm_volume,
                    duration,
                })
            }
            Some(path) => {
                info!("No background music at {}, narration only", path.display());
                None
            }
            None => None,
        };

        info!("┌─ Timeline ────────");
        info!("│ Clips: {}", clips.len());
        info!("│ Duration: {:.2}s", duration);
        info!("│ Canvas: {}x{}", canvas_width, self.config.height);
        info!("└─────────────────────────────────────");

        Ok(Timeline {
            clips,
            background,
            canvas_width,
            height: self.config.height,
            fps: self.config.fps,
            pixel_format: self.config.pixel_format.clone(),
            sample_rate: self.config.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SegmentComposer;
    use crate::compose::tests::{narration, write_image};
    use crate::config::Config;

    fn clips(dir: &Path, durations: &[f64]) -> Vec<SegmentClip> {
        let composer = SegmentComposer::new(Config::default().render);
        durations
            .iter()
            .enumerate()
            .map(|(i, seconds)| {
                let image = write_image(dir, &format!("{}.png", i), 64 + 32 * i as u32, 48);
                composer.compose(&image, None, narration(i + 1, *seconds)).unwrap()
            })
            .collect()
    }

    fn assembler() -> TimelineAssembler {
        TimelineAssembler::new(Config::default().render)
    }

    #[test]
    fn test_duration_is_sum_of_clips() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 2.0, 1.5]), None).unwrap();
        assert!((timeline.duration() - 6.0).abs() < 1e-9);
        assert_eq!(timeline.clips().iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_canvas_is_widest_image() {
        let dir = assert_fs::TempDir::new().unwrap();
        // 64x48, 96x48, 128x48 scaled to height 720
        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 1.0, 1.0]), None).unwrap();
        assert_eq!(timeline.canvas_width(), 1920);
        assert_eq!(timeline.height(), 720);
    }

    #[test]
    fn test_background_bed_matches_timeline_length() {
        let dir = assert_fs::TempDir::new().unwrap();
        let music = dir.path().join("bgm.mp3");
        std::fs::write(&music, b"music").unwrap();

        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 2.5]), Some(&music)).unwrap();
        let bed = timeline.background().unwrap();
        assert_eq!(bed.volume, 0.2);
        assert!((bed.duration - 4.5).abs() < 1e-9);

        let audio = timeline.audio_graph();
        assert_eq!(audio.output, "mix");
        assert!(audio.graph.contains("[2:a]aresample=44100"));
        assert!(audio.graph.contains("volume=0.2,atrim=0:4.500"));
        assert!(audio.graph.contains("amix=inputs=2:duration=first"));
    }

    #[test]
    fn test_missing_music_leaves_narration_only() {
        let dir = assert_fs::TempDir::new().unwrap();
        let missing = dir.path().join("nothing.mp3");

        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 1.0]), Some(&missing)).unwrap();
        assert!(timeline.background().is_none());

        let audio = timeline.audio_graph();
        assert_eq!(audio.output, "narration");
        assert_eq!(audio.map_label(), "[narration]");
        assert!(!audio.graph.contains("amix"));
        assert!(!audio.graph.contains("[2:a]"));
        assert!(audio.graph.ends_with("[a0][a1]concat=n=2:v=0:a=1[narration]"));
    }

    #[test]
    fn test_video_graph_concatenates_in_order() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 1.0, 1.0]), None).unwrap();

        let video = timeline.video_graph();
        assert_eq!(video.output, "video");
        assert!(video.graph.starts_with("[0:v]scale=960:720"));
        assert!(video.graph.contains("[1:v]scale=1440:720"));
        assert!(video.graph.contains("pad=1920:720:"));
        assert!(video.graph.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[video]"));
    }

    #[test]
    fn test_empty_timeline_is_rejected() {
        let err = assembler().assemble(Vec::new(), None).unwrap_err();
        assert!(matches!(err, TabiError::Precondition(_)));
    }

    #[test]
    fn test_into_narrations_keeps_order() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = assembler().assemble(clips(dir.path(), &[1.0, 2.0]), None).unwrap();
        let narrations = timeline.into_narrations();
        assert_eq!(narrations.iter().map(|n| n.segment_index).collect::<Vec<_>>(), vec![1, 2]);
        for audio in narrations {
            audio.close().unwrap();
        }
    }
}
