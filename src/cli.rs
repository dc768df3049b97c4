use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a narrated vlog from a text and a list of images
    Generate {
        /// Travel notes, separated by punctuation
        #[arg(short, long)]
        text: String,

        /// Image paths, in display order
        #[arg(short, long, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Directory whose images are appended to --images
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Background music file (overrides the configured path)
        #[arg(long)]
        bgm: Option<PathBuf>,

        /// Seed for padding choices and caption colors
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Translate a piece of text with the language model
    Translate {
        /// Text to translate
        text: String,
    },

    /// Show how a text would be split into segments, without any remote call
    Segments {
        /// Travel notes, separated by punctuation
        #[arg(short, long)]
        text: String,

        /// Number of images the segments are matched to
        #[arg(short = 'n', long)]
        count: usize,

        /// Seed for padding choices
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the speech engine's voices
    Voices,

    /// Write the default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "tabi.toml")]
        output: PathBuf,
    },
}
