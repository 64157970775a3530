//! YouTube Data API v3 client.
//!
//! Quota-aware: channel/video lookups and playlist listing cost 1 unit each,
//! `search.list` costs 100 and is only used as the last handle-resolution step.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::entities::channels::NewChannel;
use crate::entities::videos::NewVideo;
use crate::services::url_validator::{parse_duration, ChannelUrl, ChannelUrlKind};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const MAX_IDS_PER_REQUEST: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum YoutubeError {
    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("YouTube API access denied: {0}")]
    AccessDenied(String),

    #[error("YouTube resource not found: {0}")]
    NotFound(String),

    #[error("YouTube API error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("YouTube API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

/// Maps an unsuccessful response onto the error taxonomy using the HTTP status
/// and the Google `reason` codes in the body.
pub fn classify_error(status: u16, body: &str) -> YoutubeError {
    let parsed = serde_json::from_str::<GoogleErrorEnvelope>(body).ok();
    let (message, reasons): (String, Vec<String>) = match &parsed {
        Some(envelope) => {
            let detail_message = envelope
                .error
                .errors
                .first()
                .map(|d| d.message.clone())
                .unwrap_or_default();
            let message = if envelope.error.message.is_empty() {
                detail_message
            } else {
                envelope.error.message.clone()
            };
            let reasons = envelope.error.errors.iter().map(|d| d.reason.clone()).collect();
            (message, reasons)
        }
        None => (body.trim().to_string(), Vec::new()),
    };

    let has_reason = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(&r.as_str()));

    if has_reason(&["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded", "userRateLimitExceeded"]) {
        YoutubeError::QuotaExceeded(message)
    } else if has_reason(&["notFound", "channelNotFound", "videoNotFound", "playlistNotFound"])
        || status == 404
    {
        YoutubeError::NotFound(message)
    } else if has_reason(&["forbidden", "accessNotConfigured", "keyInvalid", "ipRefererBlocked"])
        || status == 403
    {
        YoutubeError::AccessDenied(message)
    } else {
        YoutubeError::Provider { status, message }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub standard: Option<Thumbnail>,
    pub maxres: Option<Thumbnail>,
}

impl Thumbnails {
    /// Highest quality thumbnail available.
    pub fn best_url(&self) -> Option<String> {
        self.maxres
            .as_ref()
            .or(self.standard.as_ref())
            .or(self.high.as_ref())
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub id: String,
    pub snippet: Option<ChannelSnippet>,
    pub statistics: Option<ChannelStatistics>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub custom_url: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub subscriber_count: Option<String>,
    pub video_count: Option<String>,
    pub view_count: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelItem {
    pub fn uploads_playlist_id(&self) -> String {
        self.content_details
            .as_ref()
            .and_then(|cd| cd.related_playlists.as_ref())
            .and_then(|rp| rp.uploads.clone())
            .unwrap_or_else(|| uploads_playlist_for(&self.id))
    }

    pub fn into_new_channel(self, url: String) -> NewChannel {
        let snippet = self.snippet;
        let statistics = self.statistics;
        let count = |pick: fn(&ChannelStatistics) -> &Option<String>| {
            statistics
                .as_ref()
                .and_then(|s| pick(s).as_deref())
                .and_then(|v| v.parse::<i64>().ok())
        };

        NewChannel {
            title: snippet
                .as_ref()
                .map(|s| s.title.clone())
                .unwrap_or_else(|| self.id.clone()),
            description: snippet
                .as_ref()
                .map(|s| s.description.clone())
                .filter(|d| !d.is_empty()),
            thumbnail_url: snippet.as_ref().and_then(|s| s.thumbnails.best_url()),
            custom_url: snippet.as_ref().and_then(|s| s.custom_url.clone()),
            published_at: snippet
                .as_ref()
                .and_then(|s| s.published_at.as_deref())
                .and_then(parse_timestamp),
            subscriber_count: count(|s| &s.subscriber_count),
            video_count: count(|s| &s.video_count),
            view_count: count(|s| &s.view_count),
            external_id: self.id,
            url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub snippet: SearchSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    pub channel_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub content_details: Option<VideoContentDetails>,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub channel_id: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
}

impl VideoItem {
    pub fn into_new_video(self, channel_id: Option<i64>) -> NewVideo {
        let snippet = self.snippet;
        NewVideo {
            url: format!("https://www.youtube.com/watch?v={}", self.id),
            channel_id,
            title: snippet.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
            description: snippet
                .as_ref()
                .map(|s| s.description.clone())
                .filter(|d| !d.is_empty()),
            thumbnail_url: snippet.as_ref().and_then(|s| s.thumbnails.best_url()),
            duration_seconds: self
                .content_details
                .as_ref()
                .and_then(|cd| cd.duration.as_deref())
                .and_then(parse_duration),
            view_count: self
                .statistics
                .as_ref()
                .and_then(|s| s.view_count.as_deref())
                .and_then(|v| v.parse::<i64>().ok()),
            published_at: snippet
                .as_ref()
                .and_then(|s| s.published_at.as_deref())
                .and_then(parse_timestamp),
            external_id: self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| warn!("Ignoring unparseable timestamp {:?}: {}", raw, e))
        .ok()
}

/// A channel's uploads playlist is its id with the `UC` prefix swapped for `UU`.
fn uploads_playlist_for(channel_id: &str) -> String {
    match channel_id.strip_prefix("UC") {
        Some(rest) => format!("UU{}", rest),
        None => format!("UU{}", channel_id),
    }
}

/// Picks the search candidate that is unambiguously `handle`: its custom URL is
/// `@handle` (case-insensitive) or, failing that, its title equals `handle`.
pub fn pick_exact_match<'a>(handle: &str, candidates: &'a [ChannelItem]) -> Option<&'a ChannelItem> {
    let wanted = format!("@{}", handle.trim_start_matches('@')).to_lowercase();
    let bare = handle.trim_start_matches('@');

    candidates
        .iter()
        .find(|c| {
            c.snippet
                .as_ref()
                .and_then(|s| s.custom_url.as_deref())
                .map(|custom| {
                    let custom = custom.to_lowercase();
                    custom == wanted || format!("@{}", custom) == wanted
                })
                .unwrap_or(false)
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|c| c.snippet.as_ref().map(|s| s.title == bare).unwrap_or(false))
        })
}

#[derive(Clone, Debug)]
pub struct YoutubeClient {
    http_client: Client,
    base_url: Url,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL).expect("default YouTube base URL is valid")
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http_client: Client::new(),
            base_url,
            api_key,
        })
    }

    #[tracing::instrument(name = "YouTube API request", skip(self, params))]
    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let url = self
            .base_url
            .join(resource)
            .map_err(|e| YoutubeError::Provider {
                status: 0,
                message: format!("invalid resource path {resource}: {e}"),
            })?;

        let response = self
            .http_client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!("HTTP error calling YouTube {}: {:?}", resource, e);
                YoutubeError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = classify_error(status.as_u16(), &error_text);
            error!("YouTube API error on {}: {}", resource, err);
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse YouTube {} response: {:?}", resource, e);
            YoutubeError::Transport(e.without_url())
        })
    }

    async fn first_channel(&self, params: &[(&str, &str)]) -> Result<Option<ChannelItem>, YoutubeError> {
        let mut all = vec![("part", "snippet,statistics,contentDetails")];
        all.extend_from_slice(params);
        let response: ListResponse<ChannelItem> = self.get("channels", &all).await?;
        Ok(response.items.into_iter().next())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelItem>, YoutubeError> {
        self.first_channel(&[("id", channel_id)]).await
    }

    pub async fn get_channel_by_handle(&self, handle: &str) -> Result<Option<ChannelItem>, YoutubeError> {
        let handle = format!("@{}", handle.trim_start_matches('@'));
        self.first_channel(&[("forHandle", handle.as_str())]).await
    }

    pub async fn get_channel_by_username(&self, username: &str) -> Result<Option<ChannelItem>, YoutubeError> {
        self.first_channel(&[("forUsername", username)]).await
    }

    pub async fn get_channels(&self, ids: &[String]) -> Result<Vec<ChannelItem>, YoutubeError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "snippet,statistics,contentDetails"), ("id", joined.as_str())],
            )
            .await?;
        Ok(response.items)
    }

    pub async fn search_channels(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>, YoutubeError> {
        let max_results = max_results.clamp(1, 50).to_string();
        let response: ListResponse<SearchItem> = self
            .get(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "channel"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;
        Ok(response.items)
    }

    /// Resolves `@handle` by direct handle lookup, then legacy username lookup,
    /// then a search restricted to exact matches.
    #[tracing::instrument(name = "Resolve channel handle", skip(self))]
    pub async fn resolve_handle(&self, handle: &str) -> Result<ChannelItem, YoutubeError> {
        let bare = handle.trim_start_matches('@');

        if let Some(channel) = self.get_channel_by_handle(bare).await? {
            debug!("Resolved {} via forHandle", bare);
            return Ok(channel);
        }

        if let Some(channel) = self.get_channel_by_username(bare).await? {
            debug!("Resolved {} via forUsername", bare);
            return Ok(channel);
        }

        info!("Falling back to search for handle {}", bare);
        let hits = self.search_channels(&format!("@{}", bare), 5).await?;
        let ids: Vec<String> = hits.into_iter().map(|h| h.snippet.channel_id).collect();
        let candidates = self.get_channels(&ids).await?;

        pick_exact_match(bare, &candidates)
            .cloned()
            .ok_or_else(|| YoutubeError::NotFound(format!("No channel matches handle @{}", bare)))
    }

    pub async fn resolve_channel(&self, channel_url: &ChannelUrl) -> Result<ChannelItem, YoutubeError> {
        let identifier = channel_url.identifier.as_str();
        match channel_url.kind {
            ChannelUrlKind::ChannelId => self
                .get_channel(identifier)
                .await?
                .ok_or_else(|| YoutubeError::NotFound(format!("Channel {} not found", identifier))),
            ChannelUrlKind::User => match self.get_channel_by_username(identifier).await? {
                Some(channel) => Ok(channel),
                None => self.resolve_handle(identifier).await,
            },
            ChannelUrlKind::Handle | ChannelUrlKind::Custom => self.resolve_handle(identifier).await,
        }
    }

    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoItem>, YoutubeError> {
        Ok(self
            .get_videos(&[video_id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    /// Video details in batches of 50 ids (1 quota unit per batch).
    pub async fn get_videos(&self, ids: &[String]) -> Result<Vec<VideoItem>, YoutubeError> {
        let mut videos = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk.join(",");
            let response: ListResponse<VideoItem> = self
                .get(
                    "videos",
                    &[("part", "snippet,contentDetails,statistics"), ("id", joined.as_str())],
                )
                .await?;
            videos.extend(response.items);
        }
        Ok(videos)
    }

    /// Video ids from an uploads playlist, newest first, following page tokens
    /// until `max_results` ids are collected.
    #[tracing::instrument(name = "List uploads", skip(self))]
    pub async fn list_upload_ids(
        &self,
        uploads_playlist_id: &str,
        max_results: usize,
    ) -> Result<Vec<String>, YoutubeError> {
        let mut ids = Vec::new();
        let mut next_page_token: Option<String> = None;

        while ids.len() < max_results {
            let page_size = (max_results - ids.len()).min(MAX_IDS_PER_REQUEST).to_string();
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", uploads_playlist_id),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = next_page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ListResponse<PlaylistItem> = self.get("playlistItems", &params).await?;
            ids.extend(page.items.into_iter().map(|i| i.content_details.video_id));

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(max_results);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn channel(id: &str, title: &str, custom_url: Option<&str>) -> Value {
        json!({
            "id": id,
            "snippet": {
                "title": title,
                "description": "",
                "customUrl": custom_url,
                "publishedAt": "2020-01-01T00:00:00Z",
                "thumbnails": { "high": { "url": "https://img.example/high.jpg" } }
            },
            "statistics": { "subscriberCount": "1000", "videoCount": "50", "viewCount": "10000" }
        })
    }

    async fn spawn_fake(router: Router) -> YoutubeClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        YoutubeClient::with_base_url("test-key".into(), &format!("http://{}/youtube/v3", addr)).unwrap()
    }

    #[test]
    fn test_classify_error_reasons() {
        let quota = r#"{"error": {"code": 403, "message": "Quota exceeded", "errors": [{"reason": "quotaExceeded", "message": "Quota exceeded"}]}}"#;
        assert!(matches!(classify_error(403, quota), YoutubeError::QuotaExceeded(_)));

        let forbidden = r#"{"error": {"errors": [{"reason": "forbidden", "message": "Access denied"}]}}"#;
        let err = classify_error(403, forbidden);
        assert!(matches!(err, YoutubeError::AccessDenied(ref m) if m == "Access denied"));

        let missing = r#"{"error": {"errors": [{"reason": "notFound", "message": "Not found"}]}}"#;
        assert!(matches!(classify_error(404, missing), YoutubeError::NotFound(_)));

        let generic = r#"{"error": {"message": "Internal server error"}}"#;
        let err = classify_error(500, generic);
        assert!(matches!(err, YoutubeError::Provider { status: 500, .. }));
        assert!(err.to_string().contains("YouTube API error"));

        assert!(matches!(classify_error(403, "<html>"), YoutubeError::AccessDenied(_)));
        assert!(matches!(classify_error(502, "bad gateway"), YoutubeError::Provider { .. }));
    }

    #[test]
    fn test_pick_exact_match_prefers_custom_url() {
        let candidates: Vec<ChannelItem> = serde_json::from_value(json!([
            channel("UC1", "exampleChan", None),
            channel("UC2", "Example Channel Official", Some("@ExampleChan")),
        ]))
        .unwrap();

        assert_eq!(pick_exact_match("examplechan", &candidates).unwrap().id, "UC2");
        assert_eq!(pick_exact_match("exampleChan", &candidates).unwrap().id, "UC2");
        assert!(pick_exact_match("someoneElse", &candidates).is_none());

        let by_title: Vec<ChannelItem> =
            serde_json::from_value(json!([channel("UC3", "exactTitle", None)])).unwrap();
        assert_eq!(pick_exact_match("@exactTitle", &by_title).unwrap().id, "UC3");
        assert!(pick_exact_match("exacttitle", &by_title).is_none());
    }

    #[test]
    fn test_item_conversion() {
        let item: ChannelItem = serde_json::from_value(channel("UCabc", "Chan", Some("@chan"))).unwrap();
        assert_eq!(item.uploads_playlist_id(), "UUabc");
        let new = item.into_new_channel("https://www.youtube.com/@chan".into());
        assert_eq!(new.external_id, "UCabc");
        assert_eq!(new.subscriber_count, Some(1000));
        assert_eq!(new.thumbnail_url.as_deref(), Some("https://img.example/high.jpg"));
        assert!(new.published_at.is_some());
        assert!(new.description.is_none());

        let video: VideoItem = serde_json::from_value(json!({
            "id": "dQw4w9WgXcQ",
            "snippet": { "title": "A video", "publishedAt": "2023-01-01T00:00:00Z", "thumbnails": {} },
            "contentDetails": { "duration": "PT1H30M5S" },
            "statistics": { "viewCount": "1234" }
        }))
        .unwrap();
        let new = video.into_new_video(Some(7));
        assert_eq!(new.duration_seconds, Some(5405));
        assert_eq!(new.view_count, Some(1234));
        assert_eq!(new.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(new.channel_id, Some(7));
    }

    #[tokio::test]
    async fn test_resolve_handle_falls_back_to_search() {
        let router = Router::new()
            .route(
                "/youtube/v3/channels",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("key").map(String::as_str), Some("test-key"));
                    let items = match q.get("id").map(String::as_str) {
                        Some("UCnoise,UCreal") => vec![
                            channel("UCnoise", "Unrelated", Some("@unrelated")),
                            channel("UCreal", "Example", Some("@examplechan")),
                        ],
                        _ => vec![],
                    };
                    Json(json!({ "items": items }))
                }),
            )
            .route(
                "/youtube/v3/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("q").map(String::as_str), Some("@exampleChan"));
                    Json(json!({ "items": [
                        { "snippet": { "channelId": "UCnoise", "title": "Unrelated" } },
                        { "snippet": { "channelId": "UCreal", "title": "Example" } }
                    ]}))
                }),
            );
        let client = spawn_fake(router).await;

        let resolved = client.resolve_handle("exampleChan").await.unwrap();
        assert_eq!(resolved.id, "UCreal");
    }

    #[tokio::test]
    async fn test_resolve_handle_direct_hit() {
        let router = Router::new().route(
            "/youtube/v3/channels",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let items = if q.get("forHandle").map(String::as_str) == Some("@direct") {
                    vec![channel("UCdirect", "Direct", Some("@direct"))]
                } else {
                    vec![]
                };
                Json(json!({ "items": items }))
            }),
        );
        let client = spawn_fake(router).await;

        assert_eq!(client.resolve_handle("@direct").await.unwrap().id, "UCdirect");
    }

    #[tokio::test]
    async fn test_quota_error_surfaces_from_transport() {
        let router = Router::new().route(
            "/youtube/v3/channels",
            get(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({"error": {"code": 403, "message": "Daily Limit Exceeded",
                        "errors": [{"reason": "dailyLimitExceeded", "message": "Daily Limit Exceeded"}]}})),
                )
            }),
        );
        let client = spawn_fake(router).await;

        let err = client.get_channel("UCany").await.unwrap_err();
        assert!(matches!(err, YoutubeError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_list_upload_ids_follows_pages() {
        let router = Router::new().route(
            "/youtube/v3/playlistItems",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("playlistId").map(String::as_str), Some("UUabc"));
                match q.get("pageToken").map(String::as_str) {
                    None => Json(json!({
                        "items": [
                            { "contentDetails": { "videoId": "v1" } },
                            { "contentDetails": { "videoId": "v2" } }
                        ],
                        "nextPageToken": "page2"
                    })),
                    Some(_) => Json(json!({
                        "items": [
                            { "contentDetails": { "videoId": "v3" } },
                            { "contentDetails": { "videoId": "v4" } }
                        ]
                    })),
                }
            }),
        );
        let client = spawn_fake(router).await;

        let ids = client.list_upload_ids("UUabc", 3).await.unwrap();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
    }
}
