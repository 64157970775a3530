//! Transcription jobs and their status bookkeeping.
//!
//! Every status write a run makes is a compare-and-set on the current status
//! and the run's attempt number, so that a job cancelled while a stage is
//! running is never moved forward again, not even after it has been retried.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const NON_TERMINAL: [JobStatus; 3] = [
        JobStatus::Pending,
        JobStatus::Downloading,
        JobStatus::Processing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Forward moves along the pipeline, or to failed/cancelled from any
    /// non-terminal state. Retry (failed|cancelled → pending) is separate.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Downloading) | (Downloading, Processing) | (Processing, Completed) => true,
            (from, Failed | Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "downloading" => Ok(JobStatus::Downloading),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TranscriptFormat {
    #[default]
    Txt,
    Srt,
    Vtt,
}

impl TranscriptFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Srt => "srt",
            TranscriptFormat::Vtt => "vtt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionJob {
    pub id: i64,
    pub video_id: i64,
    pub status: JobStatus,
    pub format: TranscriptFormat,
    pub output_file_path: Option<String>,
    pub transcript_content: Option<String>,
    pub provider_response: Option<String>,
    pub error_message: Option<String>,
    pub progress_percentage: i64,
    pub attempt: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptionJob {
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some((completed - started).num_seconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub video_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const NON_TERMINAL_SQL: &str = "('pending', 'downloading', 'processing')";

pub async fn insert(
    db: &SqlitePool,
    video_id: i64,
    format: TranscriptFormat,
    output_file_path: Option<&str>,
) -> Result<TranscriptionJob, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, TranscriptionJob>(
        r#"INSERT INTO transcription_jobs (video_id, status, format, output_file_path,
               progress_percentage, created_at, updated_at)
           VALUES ($1, $2, $3, $4, 0, $5, $5)
           RETURNING *"#,
    )
    .bind(video_id)
    .bind(JobStatus::Pending)
    .bind(format)
    .bind(output_file_path)
    .bind(now)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<TranscriptionJob>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptionJob>("SELECT * FROM transcription_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list(db: &SqlitePool, filter: &JobFilter) -> Result<Vec<TranscriptionJob>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM transcription_jobs WHERE 1 = 1");

    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(video_id) = filter.video_id {
        query.push(" AND video_id = ").push_bind(video_id);
    }

    query
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit.unwrap_or(50).clamp(1, 500))
        .push(" OFFSET ")
        .push_bind(filter.offset.unwrap_or(0).max(0));

    query.build_query_as::<TranscriptionJob>().fetch_all(db).await
}

pub async fn list_by_video(
    db: &SqlitePool,
    video_id: i64,
) -> Result<Vec<TranscriptionJob>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptionJob>(
        "SELECT * FROM transcription_jobs WHERE video_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(video_id)
    .fetch_all(db)
    .await
}

/// One execution of a job. `attempt` is bumped every time the job leaves
/// pending, so writes from a run that was cancelled and then superseded by a
/// retry no longer match the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
    pub job_id: i64,
    pub attempt: i64,
}

/// pending → downloading; stamps `started_at` and opens a new attempt.
/// Returns `None` if the job was not pending.
pub async fn mark_started(
    db: &SqlitePool,
    id: i64,
    progress: i64,
) -> Result<Option<RunToken>, sqlx::Error> {
    let now = Utc::now();
    let attempt: Option<i64> = sqlx::query_scalar(
        r#"UPDATE transcription_jobs
           SET status = $1, started_at = $2, progress_percentage = $3, updated_at = $2,
               attempt = attempt + 1
           WHERE id = $4 AND status = $5
           RETURNING attempt"#,
    )
    .bind(JobStatus::Downloading)
    .bind(now)
    .bind(progress)
    .bind(id)
    .bind(JobStatus::Pending)
    .fetch_optional(db)
    .await?;
    Ok(attempt.map(|attempt| RunToken { job_id: id, attempt }))
}

/// Moves `from → to` if the transition is legal and the stored status is still
/// `from` for this attempt.
pub async fn transition(
    db: &SqlitePool,
    run: RunToken,
    from: JobStatus,
    to: JobStatus,
    progress: i64,
) -> Result<bool, sqlx::Error> {
    if !from.can_transition_to(to) {
        return Ok(false);
    }

    let result = sqlx::query(
        r#"UPDATE transcription_jobs
           SET status = $1, progress_percentage = $2, updated_at = $3
           WHERE id = $4 AND attempt = $5 AND status = $6"#,
    )
    .bind(to)
    .bind(progress)
    .bind(Utc::now())
    .bind(run.job_id)
    .bind(run.attempt)
    .bind(from)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_progress(
    db: &SqlitePool,
    run: RunToken,
    expected: JobStatus,
    progress: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE transcription_jobs
           SET progress_percentage = $1, updated_at = $2
           WHERE id = $3 AND attempt = $4 AND status = $5"#,
    )
    .bind(progress.clamp(0, 100))
    .bind(Utc::now())
    .bind(run.job_id)
    .bind(run.attempt)
    .bind(expected)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn store_transcript(
    db: &SqlitePool,
    run: RunToken,
    transcript: &str,
    provider_response: &str,
    progress: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE transcription_jobs
           SET transcript_content = $1, provider_response = $2, progress_percentage = $3,
               updated_at = $4
           WHERE id = $5 AND attempt = $6 AND status = $7"#,
    )
    .bind(transcript)
    .bind(provider_response)
    .bind(progress)
    .bind(Utc::now())
    .bind(run.job_id)
    .bind(run.attempt)
    .bind(JobStatus::Processing)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// processing → completed with progress 100 and `completed_at` stamped.
pub async fn complete(db: &SqlitePool, run: RunToken) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"UPDATE transcription_jobs
           SET status = $1, progress_percentage = 100, completed_at = $2, updated_at = $2
           WHERE id = $3 AND attempt = $4 AND status = $5"#,
    )
    .bind(JobStatus::Completed)
    .bind(now)
    .bind(run.job_id)
    .bind(run.attempt)
    .bind(JobStatus::Processing)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Any non-terminal state → failed. A job already cancelled stays cancelled.
pub async fn fail(db: &SqlitePool, run: RunToken, error_message: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let sql = format!(
        r#"UPDATE transcription_jobs
           SET status = $1, error_message = $2, completed_at = $3, updated_at = $3
           WHERE id = $4 AND attempt = $5 AND status IN {NON_TERMINAL_SQL}"#
    );
    let result = sqlx::query(&sql)
        .bind(JobStatus::Failed)
        .bind(error_message)
        .bind(now)
        .bind(run.job_id)
        .bind(run.attempt)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Any non-terminal state → cancelled. Returns the updated job, or `None`
/// when the job was already terminal.
pub async fn cancel(db: &SqlitePool, id: i64) -> Result<Option<TranscriptionJob>, sqlx::Error> {
    let now = Utc::now();
    let sql = format!(
        r#"UPDATE transcription_jobs
           SET status = $1, completed_at = $2, updated_at = $2
           WHERE id = $3 AND status IN {NON_TERMINAL_SQL}
           RETURNING *"#
    );
    sqlx::query_as::<_, TranscriptionJob>(&sql)
        .bind(JobStatus::Cancelled)
        .bind(now)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// failed|cancelled → pending, clearing every result field.
pub async fn reset_for_retry(
    db: &SqlitePool,
    id: i64,
) -> Result<Option<TranscriptionJob>, sqlx::Error> {
    sqlx::query_as::<_, TranscriptionJob>(
        r#"UPDATE transcription_jobs
           SET status = $1, error_message = NULL, progress_percentage = 0, started_at = NULL,
               completed_at = NULL, transcript_content = NULL, provider_response = NULL,
               updated_at = $2
           WHERE id = $3 AND status IN ($4, $5)
           RETURNING *"#,
    )
    .bind(JobStatus::Pending)
    .bind(Utc::now())
    .bind(id)
    .bind(JobStatus::Failed)
    .bind(JobStatus::Cancelled)
    .fetch_optional(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::entities::videos;

    async fn pending_job(db: &SqlitePool) -> TranscriptionJob {
        let video = videos::insert(db, &videos::sample("abcdefghijk", None))
            .await
            .unwrap();
        insert(db, video.id, TranscriptFormat::Txt, None).await.unwrap()
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Downloading));
        assert!(!Completed.can_transition_to(Pending));

        for from in JobStatus::NON_TERMINAL {
            assert!(from.can_transition_to(Failed));
            assert!(from.can_transition_to(Cancelled));
        }
        for from in [Completed, Failed, Cancelled] {
            assert!(!from.can_transition_to(Failed));
            assert!(!from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [JobStatus::Pending, JobStatus::Cancelled, JobStatus::Completed] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let db = test_pool().await;
        let job = pending_job(&db).await;

        let unstarted = RunToken { job_id: job.id, attempt: 0 };
        assert!(!transition(&db, unstarted, JobStatus::Downloading, JobStatus::Processing, 50)
            .await
            .unwrap());
        let run = mark_started(&db, job.id, 10).await.unwrap().unwrap();
        assert_eq!(run.attempt, 1);
        assert!(mark_started(&db, job.id, 10).await.unwrap().is_none());

        let started = find_by_id(&db, job.id).await.unwrap().unwrap();
        assert_eq!(started.status, JobStatus::Downloading);
        assert_eq!(started.attempt, 1);
        assert_eq!(started.progress_percentage, 10);
        assert!(started.started_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_only_from_non_terminal() {
        let db = test_pool().await;
        let job = pending_job(&db).await;

        let cancelled = cancel(&db, job.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
        assert!(cancel(&db, job.id).await.unwrap().is_none());
        let stale = RunToken { job_id: job.id, attempt: 0 };
        assert!(!fail(&db, stale, "late failure").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_for_retry_clears_results() {
        let db = test_pool().await;
        let job = pending_job(&db).await;

        assert!(reset_for_retry(&db, job.id).await.unwrap().is_none());

        let run = mark_started(&db, job.id, 10).await.unwrap().unwrap();
        transition(&db, run, JobStatus::Downloading, JobStatus::Processing, 50)
            .await
            .unwrap();
        store_transcript(&db, run, "partial", "{}", 90).await.unwrap();
        assert!(fail(&db, run, "speech api down").await.unwrap());

        let failed = find_by_id(&db, job.id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.duration_seconds().is_some());

        let reset = reset_for_retry(&db, job.id).await.unwrap().unwrap();
        assert_eq!(reset.status, JobStatus::Pending);
        assert_eq!(reset.progress_percentage, 0);
        assert!(reset.error_message.is_none());
        assert!(reset.started_at.is_none());
        assert!(reset.completed_at.is_none());
        assert!(reset.transcript_content.is_none());
        assert!(reset.provider_response.is_none());
    }

    #[tokio::test]
    async fn test_superseded_run_cannot_write() {
        let db = test_pool().await;
        let job = pending_job(&db).await;

        let old_run = mark_started(&db, job.id, 10).await.unwrap().unwrap();
        assert!(transition(&db, old_run, JobStatus::Downloading, JobStatus::Processing, 50)
            .await
            .unwrap());
        cancel(&db, job.id).await.unwrap().unwrap();
        reset_for_retry(&db, job.id).await.unwrap().unwrap();

        let new_run = mark_started(&db, job.id, 10).await.unwrap().unwrap();
        assert_eq!(new_run.attempt, old_run.attempt + 1);
        assert!(transition(&db, new_run, JobStatus::Downloading, JobStatus::Processing, 50)
            .await
            .unwrap());

        assert!(!store_transcript(&db, old_run, "stale", "{}", 90).await.unwrap());
        assert!(!complete(&db, old_run).await.unwrap());
        assert!(!fail(&db, old_run, "stale failure").await.unwrap());

        let current = find_by_id(&db, job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::Processing);
        assert!(current.transcript_content.is_none());
        assert!(current.error_message.is_none());

        assert!(store_transcript(&db, new_run, "fresh", "{}", 90).await.unwrap());
        assert!(complete(&db, new_run).await.unwrap());
        let done = find_by_id(&db, job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.transcript_content.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_pool().await;
        let first = pending_job(&db).await;
        let other_video = videos::insert(&db, &videos::sample("zyxwvutsrqp", None))
            .await
            .unwrap();
        let second = insert(&db, other_video.id, TranscriptFormat::Srt, None)
            .await
            .unwrap();
        cancel(&db, second.id).await.unwrap();

        let cancelled = list(
            &db,
            &JobFilter {
                status: Some(JobStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, second.id);

        let for_video = list(
            &db,
            &JobFilter {
                video_id: Some(first.video_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_video.len(), 1);
        assert_eq!(for_video[0].id, first.id);

        let paged = list(
            &db,
            &JobFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(paged.len(), 1);
    }
}
