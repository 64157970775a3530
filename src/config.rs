//! Environment-driven application settings.
//!
//! Values are read once at startup (after `.env` has been loaded by `dotenv`)
//! and shared through the application state.

use std::path::PathBuf;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub youtube_api_key: Option<String>,
    pub deepgram_api_key: Option<String>,
    pub transcript_output_dir: PathBuf,
    pub temp_audio_dir: PathBuf,
    /// Reported by the health endpoint; job submission does not enforce it.
    pub max_concurrent_jobs: usize,
    pub allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://yt_transcribe.db".to_string(),
            youtube_api_key: None,
            deepgram_api_key: None,
            transcript_output_dir: PathBuf::from("./transcripts"),
            temp_audio_dir: PathBuf::from("./temp_audio"),
            max_concurrent_jobs: 5,
            allowed_origins: parse_origins("http://localhost:3000,http://localhost:5173"),
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "debug".to_string(),
            debug: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, falling back to defaults
    /// for anything missing or blank.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let max_concurrent_jobs = match get("MAX_CONCURRENT_JOBS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_CONCURRENT_JOBS is not a number: {raw}"))?,
            None => defaults.max_concurrent_jobs,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => defaults.port,
        };

        let debug = get("DEBUG")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.debug);

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            deepgram_api_key: get("DEEPGRAM_API_KEY"),
            transcript_output_dir: get("TRANSCRIPT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.transcript_output_dir),
            temp_audio_dir: get("TEMP_AUDIO_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_audio_dir),
            max_concurrent_jobs,
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or(defaults.allowed_origins),
            host: get("HOST").unwrap_or(defaults.host),
            port,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            debug,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fallback filter when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> String {
        format!("yt_transcribe={},tower_http=info", self.log_level.to_lowercase())
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
