use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::v1::channels::{
    all_channels, channel_videos, create_channel, delete_channel, discover_channel_videos,
    get_channel, validate_channel,
};
use crate::api::v1::notes::{create_note, delete_note, update_note, video_notes};
use crate::api::v1::transcription_jobs::{
    all_jobs, cancel_job, create_job, get_job, retry_job, video_transcription,
};
use crate::api::v1::videos::{all_videos, create_video, delete_video, get_video};
use crate::InnerState;

#[tracing::instrument(name = "create_v1_routes", skip(state))]
pub fn create_v1_routes(state: InnerState) -> Router {
    tracing::info!("Setting up V1 API routes");

    Router::new()
        // Channels
        .route("/channels/validate", post(validate_channel))
        .route("/channels", get(all_channels).post(create_channel))
        .route("/channels/:id", get(get_channel).delete(delete_channel))
        .route("/channels/:id/videos", get(channel_videos))
        .route("/channels/:id/discover", post(discover_channel_videos))
        // Videos
        .route("/videos", get(all_videos).post(create_video))
        .route("/videos/:id", get(get_video).delete(delete_video))
        // Notes
        .route("/videos/:id/notes", get(video_notes).post(create_note))
        .route("/notes/:id", put(update_note).delete(delete_note))
        // Transcription
        .route("/transcription/jobs", get(all_jobs).post(create_job))
        .route("/transcription/jobs/:id", get(get_job).delete(cancel_job))
        .route("/transcription/jobs/:id/retry", post(retry_job))
        .route("/transcription/videos/:id", get(video_transcription))
        .with_state(state)
}
