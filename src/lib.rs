//! Tabi - Narrated Travel Vlog Generator
//!
//! Splits travel notes into segments, rewrites each one into spoken narration
//! with a chat-completions model, synthesizes speech, and renders a captioned
//! slideshow with ffmpeg.

pub mod cli;
pub mod config;
pub mod error;
pub mod segment;
pub mod rewrite;
pub mod narrate;
pub mod caption;
pub mod compose;
pub mod timeline;
pub mod export;
pub mod media;
pub mod workflow;
