//! Tabi - Narrated Travel Vlog Generator
//!
//! Turns a few lines of travel notes and a set of photos into a narrated
//! slideshow video using a chat-completions model, espeak-ng and ffmpeg.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tabi::cli::{Args, Commands};
use tabi::config::Config;
use tabi::narrate::{SpeechEngineFactory, select_voice};
use tabi::segment::segment;
use tabi::workflow::{GenerateRequest, Workflow, collect_images, seeded_rng, translate_text};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Tabi - Narrated Travel Vlog Generator");

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("tabi.toml").exists() {
                info!("Found tabi.toml in current directory, loading...");
                Config::from_file("tabi.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Generate { text, mut images, image_dir, output, bgm, seed } => {
            if let Some(dir) = image_dir {
                images.extend(collect_images(&dir)?);
            }

            let mut workflow = Workflow::new(config)?;
            let report = workflow
                .generate(GenerateRequest { text, images, output, bgm, seed })
                .await?;

            println!("Vlog generated successfully");
            println!("{}", report.output.display());
        }
        Commands::Translate { text } => {
            let outcome = translate_text(&config.translate, &text).await;
            println!("{}", outcome.text());
        }
        Commands::Segments { text, count, seed } => {
            let mut rng = seeded_rng(seed);
            for s in segment(&text, count, &mut rng)? {
                println!("{:>3}. {}", s.index, s.text);
            }
        }
        Commands::Voices => {
            let engine = SpeechEngineFactory::create_default(&config.narrator);
            engine.check_availability().await?;
            let voices = engine.list_voices().await?;
            let selected = select_voice(&voices, &config.narrator.voice_markers);

            println!("{:<3} {:<20} {:<30}", "", "Id", "Name");
            println!("{}", "-".repeat(55));
            for voice in &voices {
                let marker = if Some(voice) == selected { "*" } else { "" };
                println!("{:<3} {:<20} {:<30}", marker, voice.id, voice.name);
            }
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    info!("Tabi completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".tabi").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "tabi.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("tabi.log").display());

    Ok(())
}
