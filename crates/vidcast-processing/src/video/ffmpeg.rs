//! FFmpeg-backed encoding of a single task.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::preset::EncodePreset;
use super::service::TranscodeError;

/// Encodes one local input file into one local output file.
#[async_trait]
pub trait EncodeExecutor: Send + Sync {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        preset: &EncodePreset,
    ) -> Result<(), TranscodeError>;
}

pub struct FfmpegEncoder {
    ffmpeg_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Version reported by `ffmpeg -version`, e.g. `6.1.1`.
    pub async fn detect_version(&self) -> Result<String, TranscodeError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(TranscodeError::EncoderFailed(format!(
                "{} -version exited with {}",
                self.ffmpeg_path, output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout).ok_or_else(|| {
            TranscodeError::EncoderFailed("Unrecognized ffmpeg version banner".to_string())
        })
    }

    fn build_args(input: &Path, output: &Path, preset: &EncodePreset) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", preset.height),
            "-b:v".to_string(),
            format!("{}k", preset.video_bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", (preset.video_bitrate_kbps as f32 * 1.2) as u32),
            "-bufsize".to_string(),
            format!("{}k", preset.video_bitrate_kbps * 2),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", preset.audio_bitrate_kbps),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

fn parse_version(banner: &str) -> Option<String> {
    let rest = banner.lines().next()?.strip_prefix("ffmpeg version ")?;
    let token = rest.split_whitespace().next()?;
    let numeric: String = token
        .trim_start_matches('n')
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (!numeric.is_empty()).then_some(numeric)
}

#[async_trait]
impl EncodeExecutor for FfmpegEncoder {
    #[tracing::instrument(skip(self, input, output), fields(preset = %preset.name))]
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        preset: &EncodePreset,
    ) -> Result<(), TranscodeError> {
        let args = Self::build_args(input, output, preset);
        let start = std::time::Instant::now();

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(TranscodeError::EncoderFailed(format!("FFmpeg failed: {}", tail)));
        }

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg encode finished"
        );
        Ok(())
    }
}
