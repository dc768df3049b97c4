use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, TabiError};

// Default values for optional configuration keys
fn default_request_timeout_secs() -> u64 {
    300
}

fn default_extra_options() -> Vec<String> {
    Vec::new()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rewrite: RewriteConfig,
    pub translate: TranslateConfig,
    pub narrator: NarratorConfig,
    pub caption: CaptionConfig,
    pub render: RenderConfig,
    pub media: MediaConfig,
}

/// Connection settings shared by every chat-completions caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEndpointConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Name of the environment variable that holds the bearer credential
    pub api_key_env: String,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(flatten)]
    pub chat: ChatEndpointConfig,
    /// Narration language, substituted for `{language}` in the system prompt
    pub language: String,
    /// System instruction seeding every conversation
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    #[serde(flatten)]
    pub chat: ChatEndpointConfig,
    /// Language the translator writes into, substituted for `{language}` in the system prompt
    pub target_language: String,
    /// System instruction for the one-shot translation call
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Path to the speech engine binary (espeak-ng)
    pub binary_path: String,
    /// Speech rate in words per minute
    pub rate: u32,
    /// Case-insensitive markers matched against voice identifiers and names
    pub voice_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// ffmpeg color names a caption color is drawn from
    pub palette: Vec<String>,
    /// Font file path, or a fontconfig family name
    pub font: String,
    pub font_size: u32,
    /// Horizontal space kept free around the caption box (frame width minus this is the wrap width)
    pub side_margin: u32,
    /// Distance from the bottom of the frame to the top of the caption
    pub bottom_offset: u32,
    pub fade_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub pixel_format: String,
    /// Silence appended to each narration clip
    pub trailing_pad_secs: f64,
    pub image_fade_secs: f64,
    /// Optional background music; absence is not an error
    pub bgm_path: PathBuf,
    /// Background music gain relative to its original level
    pub bgm_volume: f64,
    pub sample_rate: u32,
    /// Additional encoding options for the final render
    /// Common options: ["-preset", "medium", "-crf", "23"]
    #[serde(default = "default_extra_options")]
    pub extra_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_binary_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rewrite: RewriteConfig {
                chat: ChatEndpointConfig::default(),
                language: "中文".to_string(),
                system_prompt: "你是一个旅游vlog解说员，注意绝对不可以说和vlog解说无关的文字，\
                                请将用户输入的简短句子润色为自然流畅、富有变化的口语解说风格，\
                                注意不要重复、句式灵活，有前后关联性,语言为{language}。"
                    .to_string(),
            },
            translate: TranslateConfig {
                chat: ChatEndpointConfig::default(),
                target_language: "English".to_string(),
                system_prompt: "You are a translator, translating the user's input accurately into {language}, \
                                neither more nor less, and be careful not to include any text that does not \
                                belong to the user's input."
                    .to_string(),
            },
            narrator: NarratorConfig {
                binary_path: "espeak-ng".to_string(),
                rate: 150,
                voice_markers: vec!["zh".to_string(), "chinese".to_string()],
            },
            caption: CaptionConfig {
                palette: ["white", "red", "yellow", "orange", "cyan", "lime", "violet", "deepskyblue"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                font: "SimHei".to_string(),
                font_size: 32,
                side_margin: 600,
                bottom_offset: 90,
                fade_secs: 0.5,
            },
            render: RenderConfig {
                width: 1280,
                height: 720,
                fps: 24,
                video_codec: "libx264".to_string(),
                audio_codec: "aac".to_string(),
                pixel_format: "yuv420p".to_string(),
                trailing_pad_secs: 0.5,
                image_fade_secs: 0.5,
                bgm_path: PathBuf::from("assets/bgm.mp3"),
                bgm_volume: 0.2,
                sample_rate: 44100,
                extra_options: vec![
                    // "-preset".to_string(), "medium".to_string(),
                    // "-crf".to_string(), "23".to_string(),
                ],
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_binary_path: "ffprobe".to_string(),
            },
        }
    }
}

impl Default for ChatEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            model: "glm-4".to_string(),
            api_key_env: "TABI_API_KEY".to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Fill the `{language}` placeholder of a system prompt
fn with_language(prompt: &str, language: &str) -> String {
    prompt.replace(LANGUAGE_PLACEHOLDER, language)
}

const LANGUAGE_PLACEHOLDER: &str = "{language}";

impl RewriteConfig {
    /// System instruction as sent to the model
    pub fn system_instruction(&self) -> String {
        with_language(&self.system_prompt, &self.language)
    }
}

impl TranslateConfig {
    /// System instruction as sent to the model
    pub fn system_instruction(&self) -> String {
        with_language(&self.system_prompt, &self.target_language)
    }
}

impl ChatEndpointConfig {
    /// Read the bearer credential from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            TabiError::Config(format!(
                "API key not found. Please set the {} environment variable",
                self.api_key_env
            ))
        })
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TabiError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TabiError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TabiError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TabiError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
