//! Runs a transcription job end to end: download, extract audio, transcribe,
//! persist, optionally write the transcript file.
//!
//! Each run is a detached task. Errors never escape [`TranscriptionPipeline::run`];
//! they are recorded on the job row instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::entities::transcription_jobs::{self, JobStatus, RunToken};
use crate::entities::videos;
use crate::services::deepgram::SpeechToText;
use crate::services::media::MediaFetcher;
use crate::services::transcript_format;

const PROGRESS_STARTED: i64 = 10;
const PROGRESS_DOWNLOADED: i64 = 30;
const PROGRESS_AUDIO_READY: i64 = 50;
const PROGRESS_TRANSCRIBED: i64 = 90;

/// How a run ended when no stage errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The row left the expected status mid-run (cancelled, or not pending to
    /// begin with). Nothing further was written.
    Abandoned,
}

#[derive(Clone)]
pub struct TranscriptionPipeline {
    db: SqlitePool,
    media: Arc<dyn MediaFetcher>,
    speech: Arc<dyn SpeechToText>,
    transcript_output_dir: PathBuf,
}

async fn existing_file(path: Option<&str>) -> Option<PathBuf> {
    let path = PathBuf::from(path?);
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Some(path),
        _ => None,
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl TranscriptionPipeline {
    pub fn new(
        db: SqlitePool,
        media: Arc<dyn MediaFetcher>,
        speech: Arc<dyn SpeechToText>,
        transcript_output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            media,
            speech,
            transcript_output_dir: transcript_output_dir.into(),
        }
    }

    pub fn spawn(&self, job_id: i64) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(job_id).await;
        })
    }

    #[instrument(name = "Transcription job", skip(self))]
    pub async fn run(&self, job_id: i64) {
        let run = match transcription_jobs::mark_started(&self.db, job_id, PROGRESS_STARTED).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                warn!("Transcription job {} is not pending, not starting", job_id);
                return;
            }
            Err(e) => {
                error!("Could not start transcription job {}: {}", job_id, e);
                return;
            }
        };

        match self.execute(run).await {
            Ok(RunOutcome::Completed) => info!("Transcription job {} completed", job_id),
            Ok(RunOutcome::Abandoned) => {
                warn!("Transcription job {} left its expected status, stopping", job_id)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Transcription job {} failed: {}", job_id, message);
                match transcription_jobs::fail(&self.db, run, &message).await {
                    Ok(true) => {}
                    Ok(false) => warn!("Job {} moved on without this run, failure not recorded", job_id),
                    Err(db_err) => error!("Could not record failure of job {}: {}", job_id, db_err),
                }
            }
        }
    }

    /// Stages after the job has been claimed. Every write is scoped to `run`.
    async fn execute(&self, run: RunToken) -> anyhow::Result<RunOutcome> {
        let db = &self.db;
        let job = transcription_jobs::find_by_id(db, run.job_id)
            .await?
            .ok_or_else(|| anyhow!("Transcription job {} not found", run.job_id))?;
        let video = videos::find_by_id(db, job.video_id)
            .await?
            .ok_or_else(|| anyhow!("Video {} not found", job.video_id))?;

        let video_path = match existing_file(video.video_file_path.as_deref()).await {
            Some(path) => {
                info!("Reusing downloaded video {}", path.display());
                path
            }
            None => {
                let path = self
                    .media
                    .download_video(&video.url, &video.external_id)
                    .await
                    .context("Video download failed")?;
                videos::set_video_file_path(db, video.id, &path_string(&path)).await?;
                path
            }
        };

        if !transcription_jobs::set_progress(db, run, JobStatus::Downloading, PROGRESS_DOWNLOADED)
            .await?
        {
            return Ok(RunOutcome::Abandoned);
        }

        let audio_path = match existing_file(video.audio_file_path.as_deref()).await {
            Some(path) => {
                info!("Reusing extracted audio {}", path.display());
                path
            }
            None => {
                let path = self
                    .media
                    .extract_audio(&video_path, &video.external_id)
                    .await
                    .context("Audio extraction failed")?;
                videos::set_audio_file_path(db, video.id, &path_string(&path)).await?;
                path
            }
        };

        if !transcription_jobs::transition(
            db,
            run,
            JobStatus::Downloading,
            JobStatus::Processing,
            PROGRESS_AUDIO_READY,
        )
        .await?
        {
            return Ok(RunOutcome::Abandoned);
        }

        let result = self
            .speech
            .transcribe(&audio_path)
            .await
            .context("Transcription failed")?;

        if !transcription_jobs::store_transcript(
            db,
            run,
            &result.transcript,
            &result.raw.to_string(),
            PROGRESS_TRANSCRIBED,
        )
        .await?
        {
            return Ok(RunOutcome::Abandoned);
        }

        if let Some(relative) = job.output_file_path.as_deref() {
            let output_path = self.transcript_output_dir.join(relative);
            if let Some(parent) = output_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&output_path, transcript_format::render(&result, job.format))
                .await
                .with_context(|| format!("Failed to write transcript to {}", output_path.display()))?;
            info!("Transcript written to {}", output_path.display());
        }

        if transcription_jobs::complete(db, run).await? {
            Ok(RunOutcome::Completed)
        } else {
            Ok(RunOutcome::Abandoned)
        }
    }

    #[cfg(test)]
    pub(crate) async fn execute_for_test(&self, job_id: i64) -> anyhow::Result<RunOutcome> {
        match transcription_jobs::mark_started(&self.db, job_id, PROGRESS_STARTED).await? {
            Some(run) => self.execute(run).await,
            None => Ok(RunOutcome::Abandoned),
        }
    }
}
