use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::entities::channels;
use crate::entities::videos::{self, Video};
use crate::errors::AppError;
use crate::services::url_validator::extract_video_id;
use crate::InnerState;

#[derive(Debug, Deserialize)]
pub struct VideoUrlRequest {
    pub url: String,
}

#[tracing::instrument(name = "Get all videos", skip(inner))]
pub async fn all_videos(State(inner): State<InnerState>) -> Result<Json<Vec<Video>>, AppError> {
    Ok(Json(videos::list_all(&inner.db).await?))
}

/// Tracks a single video by URL. An already tracked video is returned as-is
/// with 200; a new one is looked up on YouTube and stored with 201.
#[tracing::instrument(name = "Create video", skip(inner))]
pub async fn create_video(
    State(inner): State<InnerState>,
    Json(request): Json<VideoUrlRequest>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let video_id = extract_video_id(&request.url)
        .ok_or_else(|| AppError::Validation(format!("Not a YouTube video URL: {}", request.url)))?;

    if let Some(existing) = videos::find_by_external_id(&inner.db, &video_id).await? {
        tracing::info!("create_video: {} already tracked as {}", video_id, existing.id);
        return Ok((StatusCode::OK, Json(existing)));
    }

    let item = inner
        .youtube()?
        .get_video(&video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found on YouTube", video_id)))?;

    // Link to the owning channel only when that channel is already tracked.
    let channel_id = match item.snippet.as_ref().and_then(|s| s.channel_id.as_deref()) {
        Some(external) => channels::find_by_external_id(&inner.db, external)
            .await?
            .map(|c| c.id),
        None => None,
    };

    let (video, created) = videos::insert_if_absent(&inner.db, &item.into_new_video(channel_id)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(video)))
}

#[tracing::instrument(name = "Get video", skip(inner))]
pub async fn get_video(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<Video>, AppError> {
    videos::find_by_id(&inner.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
}

#[tracing::instrument(name = "Delete video", skip(inner))]
pub async fn delete_video(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !videos::delete_cascade(&inner.db, id).await? {
        return Err(AppError::NotFound(format!("Video {} not found", id)));
    }
    tracing::info!("delete_video: removed video {}", id);
    Ok(StatusCode::NO_CONTENT)
}
