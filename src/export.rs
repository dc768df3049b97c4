//! Final encode of a timeline into a single H.264/AAC file.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::{Result, TabiError};
use crate::media::{MediaCommand, MediaProcessorTrait};
use crate::timeline::Timeline;

pub struct Exporter {
    media: Arc<dyn MediaProcessorTrait>,
    config: RenderConfig,
}

impl Exporter {
    pub fn new(media: Arc<dyn MediaProcessorTrait>, config: RenderConfig) -> Self {
        Self { media, config }
    }

    /// Mix the soundtrack into `audio_path`
    pub fn audio_command(&self, timeline: &Timeline, audio_path: &Path) -> MediaCommand {
        let graph = timeline.audio_graph();

        let mut command = self.media.command("Mix soundtrack").overwrite();
        for clip in timeline.clips() {
            command = command.input(&clip.audio.path);
        }
        if let Some(bed) = timeline.background() {
            command = command.endless_input(&bed.path);
        }

        command
            .filter_complex(graph.graph.clone())
            .map(graph.map_label())
            .no_video()
            .audio_codec(self.config.audio_codec.clone())
            .audio_sample_rate(self.config.sample_rate)
            .output(audio_path)
    }

    /// Render the picture over the mixed soundtrack into `output`
    pub fn video_command(&self, timeline: &Timeline, audio_path: &Path, output: &Path) -> MediaCommand {
        let graph = timeline.video_graph();

        let mut command = self.media.command("Render video").overwrite();
        for clip in timeline.clips() {
            command = command.looped_image(&clip.image.path, clip.duration);
        }

        command
            .input(audio_path)
            .filter_complex(graph.graph.clone())
            .map(graph.map_label())
            .map(format!("{}:a", timeline.clips().len()))
            .frame_rate(self.config.fps)
            .video_codec(self.config.video_codec.clone())
            .pixel_format(self.config.pixel_format.clone())
            .copy_audio()
            .args(self.config.extra_options.clone())
            .output(output)
    }

    /// Encode `timeline` to `output`.
    ///
    /// The mixed soundtrack goes through a `temp-audio` side-file next to the
    /// output; it is removed whether or not the render succeeds.
    pub async fn export(&self, timeline: &Timeline, output: &Path) -> Result<()> {
        let directory = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        if !directory.is_dir() {
            return Err(TabiError::FileNotFound(directory.display().to_string()));
        }

        let audio_path = tempfile::Builder::new()
            .prefix("temp-audio-")
            .suffix(".m4a")
            .tempfile_in(&directory)?
            .into_temp_path();

        info!("┌─ Exporting ────────");
        info!("│ Output: {}", output.display());
        info!("│ Duration: {:.2}s", timeline.duration());
        info!("│ Frame rate: {}", self.config.fps);
        info!("│ Codecs: {} / {}", self.config.video_codec, self.config.audio_codec);
        info!("└─────────────────────────────────────");

        let audio = self.audio_command(timeline, &audio_path);
        debug!("Soundtrack command: {:?}", audio.args);
        self.media.execute_command(audio).await?;

        let video = self.video_command(timeline, &audio_path, output);
        debug!("Render command: {:?}", video.args);
        self.media.execute_command(video).await?;

        if let Err(e) = audio_path.close() {
            warn!("Failed to remove temporary soundtrack: {}", e);
        }

        info!("Export complete: {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SegmentComposer;
    use crate::compose::tests::{narration, write_image};
    use crate::config::Config;
    use crate::media::MockMediaProcessorTrait;
    use crate::timeline::TimelineAssembler;
    use std::sync::Mutex;

    fn timeline(dir: &Path, bgm: Option<&Path>) -> Timeline {
        let config = Config::default().render;
        let composer = SegmentComposer::new(config.clone());
        let clips = (0..2)
            .map(|i| {
                let image = write_image(dir, &format!("{}.png", i), 64, 48);
                composer.compose(&image, None, narration(i + 1, 1.5)).unwrap()
            })
            .collect();
        TimelineAssembler::new(config).assemble(clips, bgm).unwrap()
    }

    fn recording_media(executed: Arc<Mutex<Vec<MediaCommand>>>) -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_command()
            .returning(|description| MediaCommand::new("ffmpeg", description));
        media.expect_execute_command().returning(move |command| {
            executed.lock().unwrap().push(command);
            Ok(())
        });
        media
    }

    fn position(args: &[String], value: &str) -> usize {
        args.iter().position(|a| a == value).unwrap()
    }

    #[tokio::test]
    async fn test_two_passes_share_the_side_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = timeline(dir.path(), None);
        let executed = Arc::new(Mutex::new(Vec::new()));
        let exporter = Exporter::new(Arc::new(recording_media(executed.clone())), Config::default().render);

        let output = dir.path().join("vlog.mp4");
        exporter.export(&timeline, &output).await.unwrap();

        let commands = executed.lock().unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].description, "Mix soundtrack");
        assert_eq!(commands[1].description, "Render video");

        let side_file = commands[0].args.last().unwrap().clone();
        assert!(side_file.contains("temp-audio-") && side_file.ends_with(".m4a"));
        assert!(commands[1].args.contains(&side_file));
        assert!(!Path::new(&side_file).exists());

        let render = &commands[1].args;
        assert_eq!(render[position(render, "-r") + 1], "24");
        assert_eq!(render[position(render, "-c:v") + 1], "libx264");
        assert_eq!(render[position(render, "-pix_fmt") + 1], "yuv420p");
        assert_eq!(render[position(render, "-c:a") + 1], "copy");
        assert_eq!(render.last().unwrap(), &output.to_string_lossy().to_string());
    }

    #[tokio::test]
    async fn test_soundtrack_without_music_has_no_mix() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = timeline(dir.path(), Some(&dir.path().join("missing.mp3")));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let exporter = Exporter::new(Arc::new(recording_media(executed.clone())), Config::default().render);

        exporter.export(&timeline, &dir.path().join("out.mp4")).await.unwrap();

        let commands = executed.lock().unwrap();
        let mix = &commands[0].args;
        assert!(!mix.contains(&"-stream_loop".to_string()));
        assert_eq!(mix[position(mix, "-map") + 1], "[narration]");
        assert_eq!(mix[position(mix, "-c:a") + 1], "aac");
        assert_eq!(mix.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[tokio::test]
    async fn test_soundtrack_loops_music_under_narration() {
        let dir = assert_fs::TempDir::new().unwrap();
        let music = dir.path().join("bgm.mp3");
        std::fs::write(&music, b"music").unwrap();
        let timeline = timeline(dir.path(), Some(&music));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let exporter = Exporter::new(Arc::new(recording_media(executed.clone())), Config::default().render);

        exporter.export(&timeline, &dir.path().join("out.mp4")).await.unwrap();

        let commands = executed.lock().unwrap();
        let mix = &commands[0].args;
        let looped = position(mix, "-stream_loop");
        assert_eq!(mix[looped + 3], music.to_string_lossy());
        assert_eq!(mix[position(mix, "-map") + 1], "[mix]");

        let graph = &mix[position(mix, "-filter_complex") + 1];
        assert!(graph.contains("atrim=0:4.000"));
    }

    #[tokio::test]
    async fn test_failed_render_still_removes_side_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let timeline = timeline(dir.path(), None);

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_command()
            .returning(|description| MediaCommand::new("ffmpeg", description));
        media
            .expect_execute_command()
            .returning(|_| Err(TabiError::Media("encoder missing".to_string())));

        let exporter = Exporter::new(Arc::new(media), Config::default().render);
        let err = exporter.export(&timeline, &dir.path().join("out.mp4")).await.unwrap_err();
        assert!(matches!(err, TabiError::Media(_)));

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("temp-audio-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
