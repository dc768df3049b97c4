// espeak-ng command-line speech engine

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, TabiError};
use super::{SpeechEngine, SpeechRequest, Voice};

pub struct EspeakEngine {
    binary_path: String,
}

impl EspeakEngine {
    pub fn new(binary_path: String) -> Self {
        Self { binary_path }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .args(args)
            .output()
            .await
            .map_err(|e| TabiError::Speech(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TabiError::Speech(format!("{} {:?} failed: {}", self.binary_path, args, stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse the table printed by `espeak-ng --voices`
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  cmn             --/M      Chinese_(Mandarin) sit/cmn              (zh-cmn 5)(zh 5)
/// ```
pub fn parse_voices(stdout: &str) -> Vec<Voice> {
    stdout
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_pty, language, _age_gender, name, ..] => Some(Voice {
                    id: language.to_string(),
                    name: name.replace('_', " "),
                }),
                _ => None,
            }
        })
        .collect()
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    async fn list_voices(&self) -> Result<Vec<Voice>> {
        let stdout = self.run(&["--voices"]).await?;
        let voices = parse_voices(&stdout);
        debug!("espeak-ng offers {} voices", voices.len());
        Ok(voices)
    }

    async fn synthesize(&self, text: &str, request: &SpeechRequest, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-s").arg(request.rate.to_string());
        if let Some(voice) = &request.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-w").arg(output)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Executing speech command: {:?}", cmd);

        let mut child = cmd.spawn()
            .map_err(|e| TabiError::Speech(format!("Failed to spawn {}: {}", self.binary_path, e)))?;

        {
            let stdin = child.stdin.as_mut()
                .ok_or_else(|| TabiError::Speech("Failed to open speech engine stdin".to_string()))?;
            stdin.write_all(text.as_bytes()).await?;
        }
        // Close stdin so the engine sees end of input
        drop(child.stdin.take());

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TabiError::Speech(format!("Speech synthesis failed: {}", stderr)));
        }

        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.run(&["--version"]).await?;
        info!("Speech engine is available");
        Ok(())
    }
}
