use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::entities::channels::{self, Channel};
use crate::entities::transcription_jobs::{self, JobFilter, JobStatus, TranscriptionJob};
use crate::entities::videos::{self, Video};
use crate::entities::TranscriptFormat;
use crate::errors::AppError;
use crate::InnerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(alias = "video_id")]
    pub video_id: i64,
    #[serde(default)]
    pub format: TranscriptFormat,
    #[serde(alias = "output_file_name")]
    pub output_file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListParams {
    pub status: Option<String>,
    #[serde(alias = "video_id")]
    pub video_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: i64,
    pub title: String,
    pub external_id: String,
    pub url: String,
}

impl From<Channel> for ChannelSummary {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            title: channel.title,
            external_id: channel.external_id,
            url: channel.url,
        }
    }
}

/// The job's video with its owning channel, when that channel is tracked.
#[derive(Debug, Serialize)]
pub struct JobVideo {
    #[serde(flatten)]
    pub video: Video,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: TranscriptionJob,
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<JobVideo>,
}

impl From<TranscriptionJob> for JobResponse {
    fn from(job: TranscriptionJob) -> Self {
        Self {
            duration_seconds: job.duration_seconds(),
            job,
            video: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTranscriptionResponse {
    #[serde(flatten)]
    pub video: Video,
    pub transcription_jobs: Vec<JobResponse>,
}

/// `{external_id}_{name}.{ext}`, relative to the transcript output directory.
/// Names that could escape that directory are rejected.
pub fn output_file_path(
    external_id: &str,
    name: &str,
    format: TranscriptFormat,
) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("outputFileName must not be empty".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(AppError::Validation(format!(
            "outputFileName must be a plain file name: {}",
            name
        )));
    }
    Ok(format!("{}_{}.{}", external_id, name, format.extension()))
}

async fn with_channel(inner: &InnerState, video: Video) -> Result<JobVideo, AppError> {
    let channel = match video.channel_id {
        Some(channel_id) => channels::find_by_id(&inner.db, channel_id).await?,
        None => None,
    };
    Ok(JobVideo {
        video,
        channel: channel.map(ChannelSummary::from),
    })
}

async fn find_job(inner: &InnerState, id: i64) -> Result<TranscriptionJob, AppError> {
    transcription_jobs::find_by_id(&inner.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transcription job {} not found", id)))
}

#[tracing::instrument(name = "List transcription jobs", skip(inner))]
pub async fn all_jobs(
    State(inner): State<InnerState>,
    Query(params): Query<JobListParams>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(JobStatus::from_str)
        .transpose()
        .map_err(AppError::Validation)?;

    let filter = JobFilter {
        status,
        video_id: params.video_id,
        limit: params.limit,
        offset: params.offset,
    };
    let jobs = transcription_jobs::list(&inner.db, &filter).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

/// Stores a pending job and starts it in the background. The response
/// carries the job as created; poll it for progress.
#[tracing::instrument(name = "Create transcription job", skip(inner))]
pub async fn create_job(
    State(inner): State<InnerState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let video = videos::find_by_id(&inner.db, request.video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", request.video_id)))?;

    let output_path = request
        .output_file_name
        .as_deref()
        .map(|name| output_file_path(&video.external_id, name, request.format))
        .transpose()?;

    let job =
        transcription_jobs::insert(&inner.db, video.id, request.format, output_path.as_deref()).await?;
    tracing::info!("create_job: job {} queued for video {}", job.id, video.external_id);

    inner.pipeline.spawn(job.id);

    let mut response = JobResponse::from(job);
    response.video = Some(with_channel(&inner, video).await?);
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(name = "Get transcription job", skip(inner))]
pub async fn get_job(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<JobResponse>, AppError> {
    let job = find_job(&inner, id).await?;
    let video = match videos::find_by_id(&inner.db, job.video_id).await? {
        Some(video) => Some(with_channel(&inner, video).await?),
        None => None,
    };
    let mut response = JobResponse::from(job);
    response.video = video;
    Ok(Json(response))
}

/// Flips a non-terminal job to cancelled. Work already in flight runs to the
/// end of its current stage and is then discarded.
#[tracing::instrument(name = "Cancel transcription job", skip(inner))]
pub async fn cancel_job(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<JobResponse>, AppError> {
    let job = find_job(&inner, id).await?;

    match transcription_jobs::cancel(&inner.db, id).await? {
        Some(cancelled) => {
            tracing::info!("cancel_job: job {} cancelled from {}", id, job.status);
            Ok(Json(JobResponse::from(cancelled)))
        }
        None => {
            let current = find_job(&inner, id).await?;
            Err(AppError::Validation(format!(
                "Cannot cancel job with status: {}",
                current.status
            )))
        }
    }
}

#[tracing::instrument(name = "Retry transcription job", skip(inner))]
pub async fn retry_job(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<JobResponse>, AppError> {
    let job = find_job(&inner, id).await?;
    if !job.status.is_retryable() {
        return Err(AppError::Validation(format!(
            "Cannot retry job with status: {}. Only failed or cancelled jobs can be retried.",
            job.status
        )));
    }

    let reset = transcription_jobs::reset_for_retry(&inner.db, id)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Job {} changed status during retry", id)))?;

    tracing::info!("retry_job: job {} reset to pending", id);
    inner.pipeline.spawn(reset.id);
    Ok(Json(JobResponse::from(reset)))
}

#[tracing::instrument(name = "Get video transcription info", skip(inner))]
pub async fn video_transcription(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Json<VideoTranscriptionResponse>, AppError> {
    let video = videos::find_by_id(&inner.db, video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;
    let jobs = transcription_jobs::list_by_video(&inner.db, video_id).await?;

    Ok(Json(VideoTranscriptionResponse {
        video,
        transcription_jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;
    use serde_json::json;

    #[test]
    fn test_output_file_path() {
        assert_eq!(
            output_file_path("abcdefghijk", "lecture", TranscriptFormat::Srt).unwrap(),
            "abcdefghijk_lecture.srt"
        );
        for bad in ["../etc/passwd", "a/b", "a\\b", "..", "   "] {
            assert!(output_file_path("abcdefghijk", bad, TranscriptFormat::Txt).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_job_validation() {
        let app = test_app().await;

        let (status, _) = app
            .send("POST", "/api/v1/transcription/jobs", Some(json!({ "videoId": 999 })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let video = videos::insert(&app.state.db, &videos::sample("abcdefghijk", None)).await.unwrap();
        let (status, _) = app
            .send(
                "POST",
                "/api/v1/transcription/jobs",
                Some(json!({ "videoId": video.id, "outputFileName": "../escape" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/transcription/jobs",
                Some(json!({ "videoId": video.id, "format": "vtt", "outputFileName": "talk" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["format"], "vtt");
        assert_eq!(body["outputFilePath"], "abcdefghijk_talk.vtt");
        assert_eq!(body["video"]["externalId"], "abcdefghijk");
        assert!(body["video"].get("channel").is_none());
    }

    #[tokio::test]
    async fn test_job_includes_owning_channel() {
        let app = test_app().await;
        let db = &app.state.db;
        let channel = channels::insert(db, &channels::sample("UCchannel0000000000000001")).await.unwrap();
        let video = videos::insert(db, &videos::sample("abcdefghijk", Some(channel.id))).await.unwrap();
        let job = transcription_jobs::insert(db, video.id, TranscriptFormat::Txt, None).await.unwrap();

        let (status, body) = app
            .send("GET", &format!("/api/v1/transcription/jobs/{}", job.id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["video"]["externalId"], "abcdefghijk");
        assert_eq!(body["video"]["channel"]["id"], channel.id);
        assert_eq!(body["video"]["channel"]["externalId"], "UCchannel0000000000000001");
        assert_eq!(body["video"]["channel"]["title"], channel.title);
        assert_eq!(body["video"]["channel"]["url"], channel.url);
    }

    #[tokio::test]
    async fn test_cancel_and_retry_rules() {
        let app = test_app().await;
        let db = &app.state.db;
        let video = videos::insert(db, &videos::sample("abcdefghijk", None)).await.unwrap();
        // Inserted directly so no background run races the assertions.
        let job = transcription_jobs::insert(db, video.id, TranscriptFormat::Txt, None).await.unwrap();
        let uri = format!("/api/v1/transcription/jobs/{}", job.id);

        let (status, _) = app.send("POST", &format!("{uri}/retry"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.send("DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");
        assert!(body["completedAt"].is_string());

        let (status, body) = app.send("DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("cancelled"));

        let (status, body) = app.send("POST", &format!("{uri}/retry"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["progressPercentage"], 0);
        assert!(body["completedAt"].is_null());

        let (status, _) = app.send("DELETE", "/api/v1/transcription/jobs/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_and_video_view() {
        let app = test_app().await;
        let db = &app.state.db;
        let first = videos::insert(db, &videos::sample("aaaaaaaaaaa", None)).await.unwrap();
        let second = videos::insert(db, &videos::sample("bbbbbbbbbbb", None)).await.unwrap();
        let job = transcription_jobs::insert(db, first.id, TranscriptFormat::Txt, None).await.unwrap();
        transcription_jobs::insert(db, second.id, TranscriptFormat::Srt, None).await.unwrap();
        transcription_jobs::cancel(db, job.id).await.unwrap();

        let (_, all) = app.send("GET", "/api/v1/transcription/jobs", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, cancelled) = app.send("GET", "/api/v1/transcription/jobs?status=cancelled", None).await;
        assert_eq!(cancelled.as_array().unwrap().len(), 1);

        let (_, by_video) = app
            .send("GET", &format!("/api/v1/transcription/jobs?video_id={}", second.id), None)
            .await;
        assert_eq!(by_video[0]["format"], "srt");

        let (status, _) = app.send("GET", "/api/v1/transcription/jobs?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, view) = app
            .send("GET", &format!("/api/v1/transcription/videos/{}", first.id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["externalId"], "aaaaaaaaaaa");
        assert_eq!(view["transcriptionJobs"][0]["status"], "cancelled");
    }
}
