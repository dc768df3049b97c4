//! Bottom-anchored, fading caption overlays rendered with ffmpeg `drawtext`.

use rand::Rng;
use rand::seq::SliceRandom;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::config::CaptionConfig;
use crate::error::{Result, TabiError};
use crate::media::format_seconds;

/// Where drawtext finds its glyphs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    /// Resolved by fontconfig
    Family(String),
}

impl FontSource {
    /// Values with a font file extension or a path separator are files
    pub fn resolve(font: &str) -> Result<Self> {
        let path = Path::new(font);
        let is_file = font.contains(std::path::MAIN_SEPARATOR)
            || matches!(
                path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
                Some("ttf" | "otf" | "ttc")
            );

        if !is_file {
            return Ok(Self::Family(font.to_string()));
        }
        if !path.exists() {
            return Err(TabiError::Caption(format!("Font file not found: {}", font)));
        }
        Ok(Self::File(path.to_path_buf()))
    }
}

/// A styled caption bound to one segment clip
#[derive(Debug)]
pub struct CaptionOverlay {
    /// Wrapped caption text, one line per row
    pub lines: Vec<String>,
    pub color: String,
    pub font: FontSource,
    pub font_size: u32,
    /// Wrap width in pixels
    pub box_width: u32,
    /// Top edge of the caption in frame coordinates
    pub y: u32,
    pub duration: f64,
    pub fade: f64,
    /// Read by drawtext verbatim (`expansion=none`), so user text needs no escaping
    textfile: TempPath,
}

impl CaptionOverlay {
    pub fn textfile(&self) -> &Path {
        &self.textfile
    }

    /// Opacity ramp: fade in, hold, fade out.
    ///
    /// On clips shorter than two fades each fade shrinks to half the clip.
    pub fn alpha_expression(&self) -> String {
        let fade = self.fade.min(self.duration / 2.0);
        if fade <= 0.0 {
            return "1".to_string();
        }
        let f = format_seconds(fade);
        let d = format_seconds(self.duration);
        format!("if(lt(t,{f}),t/{f},if(gt(t,{d}-{f}),max(0,({d}-t)/{f}),1))")
    }

    /// `drawtext` filter drawing this caption horizontally centered at `y`
    pub fn drawtext_filter(&self) -> String {
        let font = match &self.font {
            FontSource::File(path) => format!("fontfile={}", quote(&path.to_string_lossy())),
            FontSource::Family(family) => format!("font={}", quote(family)),
        };

        format!(
            "drawtext={}:textfile={}:expansion=none:fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}:alpha='{}':enable='between(t,0,{})'",
            font,
            quote(&self.textfile.to_string_lossy()),
            self.font_size,
            self.color,
            self.y,
            self.alpha_expression(),
            format_seconds(self.duration),
        )
    }
}

/// Quote a filter option value
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Estimated advance of a glyph: wide (CJK, fullwidth) glyphs are square, the rest half width
fn glyph_width(c: char, font_size: u32) -> u32 {
    let wide = matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD
    );
    if wide { font_size } else { font_size.div_ceil(2) }
}

/// Greedy wrap into lines no wider than `max_width`.
///
/// Wide glyphs break anywhere; runs of narrow glyphs break at spaces unless a
/// single word is too long for a line on its own.
pub fn wrap_text(text: &str, max_width: u32, font_size: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut width = 0u32;

    // Split into breakable units: single wide glyphs, words, and spaces
    let mut units: Vec<String> = Vec::new();
    for c in text.trim().chars() {
        let narrow_word_char = !c.is_whitespace() && glyph_width(c, font_size) < font_size;
        match units.last_mut() {
            Some(last) if narrow_word_char && last.chars().last().is_some_and(|p| {
                !p.is_whitespace() && glyph_width(p, font_size) < font_size
            }) => last.push(c),
            _ => units.push(c.to_string()),
        }
    }

    for unit in units {
        let unit_width: u32 = unit.chars().map(|c| glyph_width(c, font_size)).sum();
        let is_space = unit.chars().all(char::is_whitespace);

        if width + unit_width <= max_width {
            if !(is_space && line.is_empty()) {
                line.push_str(&unit);
                width += unit_width;
            }
            continue;
        }

        if !line.is_empty() {
            lines.push(line.trim_end().to_string());
            line.clear();
            width = 0;
        }
        if is_space {
            continue;
        }

        if unit_width <= max_width {
            line.push_str(&unit);
            width = unit_width;
        } else {
            // Hard break an overlong word
            for c in unit.chars() {
                let w = glyph_width(c, font_size);
                if width + w > max_width && !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    width = 0;
                }
                line.push(c);
                width += w;
            }
        }
    }

    if !line.trim().is_empty() {
        lines.push(line.trim_end().to_string());
    }
    lines
}

pub struct CaptionBuilder {
    config: CaptionConfig,
}

impl CaptionBuilder {
    pub fn new(config: CaptionConfig) -> Self {
        Self { config }
    }

    /// Build the overlay, or `None` when it cannot be rendered
    pub fn build<R: Rng + ?Sized>(
        &self,
        text: &str,
        frame_width: u32,
        frame_height: u32,
        duration: f64,
        rng: &mut R,
    ) -> Option<CaptionOverlay> {
        match self.try_build(text, frame_width, frame_height, duration, rng) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                warn!("Caption creation failed, continuing without caption: {}", e);
                None
            }
        }
    }

    fn try_build<R: Rng + ?Sized>(
        &self,
        text: &str,
        frame_width: u32,
        frame_height: u32,
        duration: f64,
        rng: &mut R,
    ) -> Result<CaptionOverlay> {
        let color = self.config.palette
            .choose(rng)
            .cloned()
            .ok_or_else(|| TabiError::Caption("Caption palette is empty".to_string()))?;

        if self.config.font_size == 0 {
            return Err(TabiError::Caption("Font size must be positive".to_string()));
        }
        let box_width = frame_width
            .checked_sub(self.config.side_margin)
            .filter(|w| *w >= self.config.font_size)
            .ok_or_else(|| TabiError::Caption(format!(
                "Frame width {} leaves no room for a caption with margin {}",
                frame_width, self.config.side_margin
            )))?;
        let y = frame_height
            .checked_sub(self.config.bottom_offset)
            .ok_or_else(|| TabiError::Caption(format!(
                "Frame height {} is smaller than the caption offset {}",
                frame_height, self.config.bottom_offset
            )))?;

        let font = FontSource::resolve(&self.config.font)?;

        let lines = wrap_text(text, box_width, self.config.font_size);
        if lines.is_empty() {
            return Err(TabiError::Caption("Caption text is empty".to_string()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("tabi-caption-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(lines.join("\n").as_bytes())?;
        file.flush()?;
        let textfile = file.into_temp_path();

        debug!("Caption in {} over {} lines: {:?}", color, lines.len(), lines);

        Ok(CaptionOverlay {
            lines,
            color,
            font,
            font_size: self.config.font_size,
            box_width,
            y,
            duration,
            fade: self.config.fade_secs,
            textfile,
        })
    }
}
