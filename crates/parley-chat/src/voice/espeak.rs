//! Synthesis engine driving the `espeak` command.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::debug;

use super::{SynthesisEngine, Utterance, VoiceInfo};

/// espeak speaking rate at multiplier 1.0, in words per minute.
const BASE_WPM: f32 = 175.0;
/// espeak pitch at multiplier 1.0 (range 0..=99).
const BASE_PITCH: f32 = 50.0;
const STDERR_DETAIL_CHARS: usize = 200;

pub struct EspeakSynthesis {
    program: String,
    cancel: Notify,
}

impl Default for EspeakSynthesis {
    fn default() -> Self {
        Self::new("espeak")
    }
}

impl EspeakSynthesis {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cancel: Notify::new(),
        }
    }
}

fn words_per_minute(rate: f32) -> u32 {
    (BASE_WPM * rate).round().clamp(80.0, 450.0) as u32
}

fn espeak_pitch(pitch: f32) -> u32 {
    (BASE_PITCH * pitch).round().clamp(0.0, 99.0) as u32
}

/// Command line arguments for `utterance`. The text itself goes to stdin.
fn build_args(utterance: &Utterance) -> Vec<String> {
    let mut args = vec![
        "-s".to_string(),
        words_per_minute(utterance.rate).to_string(),
        "-p".to_string(),
        espeak_pitch(utterance.pitch).to_string(),
    ];
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.clone());
    }
    args.push("--stdin".to_string());
    args
}

/// Last non-empty stderr line, capped at `STDERR_DETAIL_CHARS`.
fn stderr_summary(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let line = text.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(STDERR_DETAIL_CHARS).collect())
}

/// Parse the table printed by `espeak --voices`:
///
/// ```text
/// Pty Language Age/Gender VoiceName          File          Other Languages
///  5  af             M  afrikaans            other/af
/// ```
fn parse_voices(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            Some(VoiceInfo {
                name: cols[3].to_string(),
                lang: cols[1].to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl SynthesisEngine for EspeakSynthesis {
    async fn voices(&self) -> Vec<VoiceInfo> {
        match Command::new(&self.program).arg("--voices").output().await {
            Ok(output) if output.status.success() => {
                parse_voices(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(status = %output.status, "espeak --voices failed");
                Vec::new()
            }
            Err(e) => {
                debug!(error = %e, "espeak not available");
                Vec::new()
            }
        }
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), String> {
        let mut child = Command::new(&self.program)
            .args(build_args(utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start {}: {}", self.program, e))?;

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(utterance.text.as_bytes())
                .await
                .map_err(|e| e.to_string())?;
        }

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = self.cancel.notified() => None,
        };

        match finished {
            Some(status) => {
                let status = status.map_err(|e| e.to_string())?;
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    return Ok(());
                }
                match stderr_summary(&stderr) {
                    Some(detail) => Err(format!(
                        "{} exited with {}: {}",
                        self.program, status, detail
                    )),
                    None => Err(format!("{} exited with {}", self.program, status)),
                }
            }
            None => {
                stderr_task.abort();
                let _ = child.kill().await;
                Err("interrupted".to_string())
            }
        }
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}
