//! Speech-to-text through Deepgram's pre-recorded `/v1/listen` endpoint.

use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.deepgram.com/";

/// One speaker turn with its time span in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Utterance {
    pub start: f64,
    pub end: f64,
    pub transcript: String,
}

#[derive(Debug, Clone)]
pub struct SpeechResult {
    pub transcript: String,
    pub utterances: Vec<Utterance>,
    /// Full provider response, stored verbatim on the job.
    pub raw: Value,
}

impl SpeechResult {
    /// Length of the audio as reported by the provider, if any.
    pub fn duration(&self) -> Option<f64> {
        self.raw
            .pointer("/metadata/duration")
            .and_then(Value::as_f64)
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<SpeechResult>;
}

/// Pulls the transcript and utterances out of a `/v1/listen` response body.
pub fn parse_response(raw: Value) -> anyhow::Result<SpeechResult> {
    let transcript = raw
        .pointer("/results/channels/0/alternatives/0/transcript")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let utterances = match raw.pointer("/results/utterances") {
        Some(list) => Vec::<Utterance>::deserialize(list)
            .context("Malformed utterances in Deepgram response")?,
        None => Vec::new(),
    };

    Ok(SpeechResult {
        transcript,
        utterances,
        raw,
    })
}

#[derive(Clone, Debug)]
pub struct DeepgramClient {
    http_client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl DeepgramClient {
    /// A client without a key fails every transcription with a configuration
    /// error instead of refusing to start the server.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default Deepgram base URL is valid"),
            api_key,
        }
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            http_client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    #[instrument(name = "Deepgram transcription", skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<SpeechResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Deepgram API key not configured"))?;

        let audio = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio_path.display()))?;
        debug!("Uploading {} bytes of audio", audio.len());

        let url = self.base_url.join("v1/listen")?;
        let response = self
            .http_client
            .post(url)
            .query(&[
                ("model", "nova-2"),
                ("language", "en"),
                ("smart_format", "true"),
                ("punctuate", "true"),
                ("paragraphs", "true"),
                ("diarize", "true"),
                ("utterances", "true"),
                ("summarize", "v2"),
                ("topics", "true"),
            ])
            .header("Authorization", format!("Token {}", api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await
            .map_err(|e| anyhow!("Deepgram request failed: {}", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Deepgram API error {}: {}", status, body);
            return Err(anyhow!("Deepgram API error (HTTP {}): {}", status.as_u16(), body));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Deepgram response: {}", e.without_url()))?;
        let result = parse_response(raw)?;

        info!(
            "Transcribed {} characters in {} utterances",
            result.transcript.len(),
            result.utterances.len()
        );
        Ok(result)
    }
}
