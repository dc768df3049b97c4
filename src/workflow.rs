use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::caption::CaptionBuilder;
use crate::compose::SegmentComposer;
use crate::config::{Config, TranslateConfig};
use crate::error::{Result, TabiError};
use crate::export::Exporter;
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::narrate::{Narrator, SpeechEngineFactory};
use crate::rewrite::{ChatClientFactory, RewriteOutcome, TextRewriter, Translator};
use crate::segment::segment;
use crate::timeline::TimelineAssembler;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Everything one vlog run needs
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub text: String,
    pub images: Vec<PathBuf>,
    pub output: PathBuf,
    /// Overrides the configured background music path
    pub bgm: Option<PathBuf>,
    /// Fixes padding choices and caption colors
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub struct GenerateReport {
    pub output: PathBuf,
    /// Narration actually used per segment, in order
    pub outcomes: Vec<RewriteOutcome>,
    pub duration: f64,
}

impl GenerateReport {
    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }
}

pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaProcessorTrait>,
    rewriter: TextRewriter,
    narrator: Narrator,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
        let client = ChatClientFactory::create_client(&config.rewrite.chat)?;
        let rewriter = TextRewriter::new(client, &config.rewrite);
        let engine = SpeechEngineFactory::create_default(&config.narrator);
        let narrator = Narrator::new(engine, media.clone(), config.narrator.clone());

        Ok(Self::with_components(config, media, rewriter, narrator))
    }

    pub fn with_components(
        config: Config,
        media: Arc<dyn MediaProcessorTrait>,
        rewriter: TextRewriter,
        narrator: Narrator,
    ) -> Self {
        Self { config, media, rewriter, narrator }
    }

    /// Produce one narrated vlog from a text blob and an ordered image list
    pub async fn generate(&mut self, request: GenerateRequest) -> Result<GenerateReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("generate", run = %run_id);
        self.run(request).instrument(span).await
    }

    async fn run(&mut self, request: GenerateRequest) -> Result<GenerateReport> {
        let GenerateRequest { text, images, output, bgm, seed } = request;

        if images.is_empty() {
            return Err(TabiError::Precondition("At least one image is required".to_string()));
        }
        for image in &images {
            if !image.is_file() {
                return Err(TabiError::FileNotFound(image.display().to_string()));
            }
        }

        let mut rng = seeded_rng(seed);
        let segments = segment(&text, images.len(), &mut rng)?;
        check_segment_count(segments.len(), images.len())?;

        // Fail on missing tools before any remote call is made
        self.media.check_availability().await?;
        self.narrator.engine().check_availability().await?;
        self.narrator.resolve_voice().await;

        info!("┌─ Generating vlog ────────");
        info!("│ Segments: {} ({} rendered)", segments.len(), segments.len().min(images.len()));
        info!("│ Images: {}", images.len());
        info!("│ Output: {}", output.display());
        info!("└─────────────────────────────────────");

        let render = self.config.render.clone();
        let captions = CaptionBuilder::new(self.config.caption.clone());
        let composer = SegmentComposer::new(render.clone());

        let progress = progress_bar(segments.len() as u64);
        let mut context = self.rewriter.start_conversation();
        let mut clips = Vec::with_capacity(segments.len());
        let mut outcomes = Vec::with_capacity(segments.len());

        for (position, segment) in segments.iter().enumerate() {
            let (next, outcome) = self.rewriter.rewrite_segment(context, segment).await;
            context = next;
            info!("[segment {}] {}", segment.index, outcome.text());

            // Segments pair with images in order; one left over (the closing line) is not rendered
            if let Some(image) = images.get(position) {
                let audio = self.narrator.synthesize(segment.index, outcome.text()).await?;
                let duration = composer.clip_duration(&audio);
                let caption = captions.build(outcome.text(), render.width, render.height, duration, &mut rng);
                clips.push(composer.compose(image, caption, audio)?);
            } else {
                debug!("Segment {} has no image and is not rendered", segment.index);
            }

            outcomes.push(outcome);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let bgm = bgm.unwrap_or_else(|| render.bgm_path.clone());
        let timeline = TimelineAssembler::new(render.clone()).assemble(clips, Some(&bgm))?;
        let duration = timeline.duration();

        Exporter::new(self.media.clone(), render).export(&timeline, &output).await?;

        for audio in timeline.into_narrations() {
            let index = audio.segment_index;
            if let Err(e) = audio.close() {
                warn!("Failed to remove narration for segment {}: {}", index, e);
            }
        }

        let report = GenerateReport { output, outcomes, duration };
        if report.fallback_count() > 0 {
            warn!("{} of {} segments kept their original text", report.fallback_count(), report.outcomes.len());
        }
        info!("Vlog generated: {} ({:.2}s)", report.output.display(), report.duration);
        Ok(report)
    }
}

/// Segments may outnumber images by one (the closing line)
pub fn check_segment_count(segments: usize, images: usize) -> Result<()> {
    if segments > images + 1 {
        return Err(TabiError::Precondition(format!(
            "{} segments need at least {} images, got {}",
            segments,
            segments - 1,
            images
        )));
    }
    Ok(())
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Image files under `dir`, sorted by path
pub fn collect_images<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(TabiError::Config(format!("{} is not a directory", dir.display())));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(extension) = entry.path().extension().and_then(|e| e.to_str()) {
            if IMAGE_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
                images.push(entry.path().to_path_buf());
            }
        }
    }
    images.sort();

    info!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}

/// One-shot translation; the original text comes back on any failure,
/// including a missing credential
pub async fn translate_text(config: &TranslateConfig, text: &str) -> RewriteOutcome {
    match ChatClientFactory::create_client(&config.chat) {
        Ok(client) => Translator::new(client, config).translate(text).await,
        Err(e) => {
            warn!("Translation unavailable, using original text: {}", e);
            RewriteOutcome::Fallback { text: text.to_string(), cause: e.to_string() }
        }
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::tests::write_image;
    use crate::media::{MediaCommand, MockMediaProcessorTrait};
    use crate::narrate::MockSpeechEngine;
    use crate::rewrite::MockChatClient;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chat_failing_on(failing_call: usize) -> MockChatClient {
        let calls = AtomicUsize::new(0);
        let mut client = MockChatClient::new();
        client.expect_complete().returning(move |messages| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == failing_call {
                Err(TabiError::Rewrite("503 Service Unavailable".to_string()))
            } else {
                Ok(format!("润色{}（{}条消息）", call, messages.len()))
            }
        });
        client
    }

    fn speech_engine(synthesis_calls: usize) -> MockSpeechEngine {
        let mut engine = MockSpeechEngine::new();
        engine.expect_check_availability().returning(|| Ok(()));
        engine.expect_list_voices().returning(|| Ok(Vec::new()));
        engine
            .expect_synthesize()
            .times(synthesis_calls)
            .returning(|_, _, _| Ok(()));
        engine
    }

    fn media(executed: Arc<Mutex<Vec<MediaCommand>>>) -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_check_availability().returning(|| Ok(()));
        media.expect_probe_duration().returning(|_| Ok(1.0));
        media
            .expect_command()
            .returning(|description| MediaCommand::new("ffmpeg", description));
        media.expect_execute_command().returning(move |command| {
            executed.lock().unwrap().push(command);
            Ok(())
        });
        media
    }

    fn workflow(
        client: MockChatClient,
        engine: MockSpeechEngine,
        media: MockMediaProcessorTrait,
    ) -> Workflow {
        let config = Config::default();
        let media: Arc<dyn MediaProcessorTrait> = Arc::new(media);
        let rewriter = TextRewriter::new(Box::new(client), &config.rewrite);
        let narrator = Narrator::new(Box::new(engine), media.clone(), config.narrator.clone());
        Workflow::with_components(config, media, rewriter, narrator)
    }

    #[test]
    fn test_segment_count_precondition() {
        assert!(check_segment_count(4, 3).is_ok());
        assert!(check_segment_count(1, 1).is_ok());
        let err = check_segment_count(5, 3).unwrap_err();
        assert!(matches!(err, TabiError::Precondition(_)));
    }

    #[test]
    fn test_collect_images_filters_and_sorts() {
        let dir = assert_fs::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("day2")).unwrap();
        for name in ["b.JPG", "a.png", "notes.txt", "day2/c.jpeg", "day2/clip.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let images = collect_images(dir.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "day2/c.jpeg"]);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let a: u64 = seeded_rng(Some(9)).r#gen();
        let b: u64 = seeded_rng(Some(9)).r#gen();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_translate_without_credential_returns_original() {
        let mut config = Config::default().translate;
        config.chat.api_key_env = "TABI_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let outcome = translate_text(&config, "门票打了五折").await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), "门票打了五折");
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_second_segment() {
        let dir = assert_fs::TempDir::new().unwrap();
        let images: Vec<PathBuf> = (1..=3)
            .map(|i| write_image(dir.path(), &format!("{}.png", i), 64, 48))
            .collect();
        let executed = Arc::new(Mutex::new(Vec::new()));
        let mut workflow = workflow(chat_failing_on(2), speech_engine(3), media(executed.clone()));

        let report = workflow
            .generate(GenerateRequest {
                text: "我们到了东京，我们去了海边，晚上吃了拉面".to_string(),
                images: images.clone(),
                output: dir.path().join("vlog.mp4"),
                bgm: Some(dir.path().join("no-music.mp3")),
                seed: Some(7),
            })
            .await
            .unwrap();

        let texts: Vec<&str> = report.outcomes.iter().map(|o| o.text()).collect();
        assert_eq!(
            texts,
            vec!["润色1（2条消息）", "我们去了海边", "润色3（6条消息）", "润色4（8条消息）"]
        );
        assert!(report.outcomes[1].is_fallback());
        assert_eq!(report.fallback_count(), 1);
        // The closing line is rewritten but has no image of its own
        assert!((report.duration - 4.5).abs() < 1e-9);

        let commands = executed.lock().unwrap();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].args.iter().all(|a| !a.contains("amix")));
        assert_eq!(commands[0].args.iter().filter(|a| *a == "-i").count(), 3);

        let render = &commands[1].args;
        assert_eq!(render.iter().filter(|a| *a == "-loop").count(), 3);
        for image in &images {
            let image = image.to_string_lossy().to_string();
            assert_eq!(render.iter().filter(|a| **a == image).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_missing_images_fail_before_any_remote_call() {
        // No expectations: any call on these mocks panics
        let mut workflow = workflow(
            MockChatClient::new(),
            MockSpeechEngine::new(),
            MockMediaProcessorTrait::new(),
        );

        let err = workflow
            .generate(GenerateRequest {
                text: "我们到了东京".to_string(),
                images: Vec::new(),
                output: PathBuf::from("out.mp4"),
                bgm: None,
                seed: Some(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabiError::Precondition(_)));

        let err = workflow
            .generate(GenerateRequest {
                text: "我们到了东京".to_string(),
                images: vec![PathBuf::from("/nonexistent/photo.jpg")],
                output: PathBuf::from("out.mp4"),
                bgm: None,
                seed: Some(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabiError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_before_any_remote_call() {
        let dir = assert_fs::TempDir::new().unwrap();
        let image = write_image(dir.path(), "1.png", 64, 48);
        let mut workflow = workflow(
            MockChatClient::new(),
            MockSpeechEngine::new(),
            MockMediaProcessorTrait::new(),
        );

        let err = workflow
            .generate(GenerateRequest {
                text: "，。！".to_string(),
                images: vec![image],
                output: dir.path().join("out.mp4"),
                bgm: None,
                seed: Some(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabiError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_aborts_before_rewriting() {
        let dir = assert_fs::TempDir::new().unwrap();
        let image = write_image(dir.path(), "1.png", 64, 48);

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_check_availability()
            .returning(|| Err(TabiError::Media("ffmpeg not found".to_string())));
        let mut workflow = workflow(MockChatClient::new(), MockSpeechEngine::new(), media);

        let err = workflow
            .generate(GenerateRequest {
                text: "我们到了东京".to_string(),
                images: vec![image],
                output: dir.path().join("out.mp4"),
                bgm: None,
                seed: Some(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabiError::Media(_)));
    }
}
