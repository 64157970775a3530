//! Video download (yt-dlp) and audio extraction (ffmpeg).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Downloaded video file not found for {0}")]
    MissingDownload(String),

    #[error("Audio extraction failed for {0}")]
    MissingAudio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Downloads the video at `url` and returns the local file path.
    async fn download_video(&self, url: &str, external_id: &str) -> Result<PathBuf, MediaError>;

    /// Extracts mono 16 kHz PCM WAV audio and returns its path.
    async fn extract_audio(&self, video_path: &Path, external_id: &str) -> Result<PathBuf, MediaError>;
}

/// Files live under `temp_dir`: videos in `videos/{id}.*`, audio as `{id}.wav`.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    temp_dir: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn video_dir(&self) -> PathBuf {
        self.temp_dir.join("videos")
    }

    pub fn audio_path(&self, external_id: &str) -> PathBuf {
        self.temp_dir.join(format!("{}.wav", external_id))
    }
}

/// First regular file in `dir` named `{external_id}.<ext>`.
pub async fn find_downloaded(dir: &Path, external_id: &str) -> Result<Option<PathBuf>, MediaError> {
    let prefix = format!("{}.", external_id);
    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_file && name.starts_with(&prefix) && !name.ends_with(".part") {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

async fn run_tool(tool: &str, command: &mut Command) -> Result<(), MediaError> {
    let result = command
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(MediaError::ToolFailed {
            tool: tool.to_string(),
            message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::ToolNotFound(tool.to_string()))
        }
        Err(e) => Err(MediaError::ToolFailed {
            tool: tool.to_string(),
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    #[instrument(skip(self))]
    async fn download_video(&self, url: &str, external_id: &str) -> Result<PathBuf, MediaError> {
        let video_dir = self.video_dir();
        tokio::fs::create_dir_all(&video_dir).await?;

        let template = video_dir.join(format!("{}.%(ext)s", external_id));
        info!("Downloading video from {}", url);

        run_tool(
            "yt-dlp",
            Command::new("yt-dlp")
                .arg("--format")
                .arg("best[height<=720]")
                .arg("--output")
                .arg(&template)
                .arg("--no-playlist")
                .arg("--quiet")
                .arg("--no-warnings")
                .arg(url),
        )
        .await?;

        find_downloaded(&video_dir, external_id)
            .await?
            .ok_or_else(|| MediaError::MissingDownload(external_id.to_string()))
    }

    #[instrument(skip(self), fields(video_path = %video_path.display()))]
    async fn extract_audio(&self, video_path: &Path, external_id: &str) -> Result<PathBuf, MediaError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let audio_path = self.audio_path(external_id);
        debug!("Extracting audio to {}", audio_path.display());

        run_tool(
            "ffmpeg",
            Command::new("ffmpeg")
                .arg("-i")
                .arg(video_path)
                .arg("-vn")
                .arg("-acodec")
                .arg("pcm_s16le")
                .arg("-ac")
                .arg("1")
                .arg("-ar")
                .arg("16000")
                .arg("-y")
                .arg("-loglevel")
                .arg("error")
                .arg(&audio_path),
        )
        .await?;

        if !tokio::fs::try_exists(&audio_path).await.unwrap_or(false) {
            return Err(MediaError::MissingAudio(external_id.to_string()));
        }
        Ok(audio_path)
    }
}
