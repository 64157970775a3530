use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::entities::channels::{self, Channel, ChannelDeletion, NewChannel};
use crate::entities::videos::{self, Video};
use crate::errors::AppError;
use crate::services::url_validator::{validate_channel_url, ChannelUrl, ChannelUrlKind};
use crate::InnerState;

const DEFAULT_DISCOVER_LIMIT: usize = 50;
const MAX_DISCOVER_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ChannelUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChannelUrlKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverParams {
    #[serde(alias = "max_results")]
    pub max_results: Option<usize>,
}

#[tracing::instrument(name = "Validate channel URL")]
pub async fn validate_channel(Json(request): Json<ChannelUrlRequest>) -> Json<ChannelValidationResponse> {
    let response = match validate_channel_url(&request.url) {
        Ok(parsed) => ChannelValidationResponse {
            valid: true,
            kind: Some(parsed.kind),
            identifier: Some(parsed.identifier),
            normalized_url: Some(parsed.normalized_url),
            error: None,
        },
        Err(e) => {
            tracing::debug!("Rejected channel URL: {}", e);
            ChannelValidationResponse {
                valid: false,
                kind: None,
                identifier: None,
                normalized_url: None,
                error: Some(e.to_string()),
            }
        }
    };
    Json(response)
}

#[tracing::instrument(name = "Get all channels", skip(inner))]
pub async fn all_channels(State(inner): State<InnerState>) -> Result<Json<Vec<Channel>>, AppError> {
    let channels = channels::list_all(&inner.db).await?;
    tracing::info!("all_channels: returning {} channels", channels.len());
    Ok(Json(channels))
}

/// Record stored when no metadata API key is configured: only what the URL
/// itself tells us.
fn offline_channel(parsed: &ChannelUrl) -> NewChannel {
    NewChannel {
        external_id: parsed.identifier.clone(),
        title: parsed.identifier.clone(),
        url: parsed.normalized_url.clone(),
        custom_url: match parsed.kind {
            ChannelUrlKind::Handle => Some(format!("@{}", parsed.identifier)),
            ChannelUrlKind::Custom | ChannelUrlKind::User => Some(parsed.identifier.clone()),
            ChannelUrlKind::ChannelId => None,
        },
        ..Default::default()
    }
}

#[tracing::instrument(name = "Create channel", skip(inner))]
pub async fn create_channel(
    State(inner): State<InnerState>,
    Json(request): Json<ChannelUrlRequest>,
) -> Result<(StatusCode, Json<Channel>), AppError> {
    let parsed = validate_channel_url(&request.url).map_err(|e| AppError::Validation(e.to_string()))?;

    if let Some(existing) = channels::find_by_url(&inner.db, &parsed.normalized_url).await? {
        tracing::warn!("create_channel: {} already tracked", parsed.normalized_url);
        return Err(AppError::Conflict(format!(
            "Channel already exists: {}",
            existing.title
        )));
    }

    let new_channel = match &inner.youtube {
        Some(youtube) => youtube
            .resolve_channel(&parsed)
            .await?
            .into_new_channel(parsed.normalized_url.clone()),
        None => {
            tracing::warn!("create_channel: no YouTube API key, storing URL-derived record");
            offline_channel(&parsed)
        }
    };

    if let Some(existing) = channels::find_by_external_id(&inner.db, &new_channel.external_id).await? {
        return Err(AppError::Conflict(format!(
            "Channel already exists: {}",
            existing.title
        )));
    }

    let channel = channels::insert(&inner.db, &new_channel).await?;
    tracing::info!("create_channel: stored channel {} ({})", channel.id, channel.external_id);
    Ok((StatusCode::CREATED, Json(channel)))
}

#[tracing::instrument(name = "Get channel", skip(inner))]
pub async fn get_channel(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<Channel>, AppError> {
    channels::find_by_id(&inner.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", id)))
}

#[tracing::instrument(name = "Delete channel", skip(inner))]
pub async fn delete_channel(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<ChannelDeletion>, AppError> {
    let deletion = channels::delete_cascade(&inner.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", id)))?;

    tracing::info!(
        "delete_channel: removed channel {} with {} videos, {} jobs, {} notes",
        id,
        deletion.videos_deleted,
        deletion.jobs_deleted,
        deletion.notes_deleted
    );
    Ok(Json(deletion))
}

#[tracing::instrument(name = "Get channel videos", skip(inner))]
pub async fn channel_videos(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Video>>, AppError> {
    if channels::find_by_id(&inner.db, id).await?.is_none() {
        return Err(AppError::NotFound(format!("Channel {} not found", id)));
    }
    Ok(Json(videos::list_by_channel(&inner.db, id).await?))
}

/// Pulls the channel's most recent uploads and stores the ones not seen yet.
/// Returns only the newly stored videos.
#[tracing::instrument(name = "Discover channel videos", skip(inner))]
pub async fn discover_channel_videos(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
    Query(params): Query<DiscoverParams>,
) -> Result<Json<Vec<Video>>, AppError> {
    let channel = channels::find_by_id(&inner.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", id)))?;
    let youtube = inner.youtube()?;

    let remote = youtube.get_channel(&channel.external_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Channel {} not found on YouTube", channel.external_id))
    })?;

    let limit = params
        .max_results
        .unwrap_or(DEFAULT_DISCOVER_LIMIT)
        .clamp(1, MAX_DISCOVER_LIMIT);
    let upload_ids = youtube
        .list_upload_ids(&remote.uploads_playlist_id(), limit)
        .await?;

    let mut unseen = Vec::new();
    for video_id in upload_ids {
        if videos::find_by_external_id(&inner.db, &video_id).await?.is_none() {
            unseen.push(video_id);
        }
    }
    tracing::info!("discover: {} new uploads for channel {}", unseen.len(), id);

    let mut stored = Vec::with_capacity(unseen.len());
    for item in youtube.get_videos(&unseen).await? {
        let (video, created) =
            videos::insert_if_absent(&inner.db, &item.into_new_video(Some(channel.id))).await?;
        if created {
            stored.push(video);
        }
    }

    Ok(Json(stored))
}
