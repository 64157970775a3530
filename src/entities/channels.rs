use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub custom_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub view_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewChannel {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub custom_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub view_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Row counts removed by [`delete_cascade`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDeletion {
    pub jobs_deleted: u64,
    pub notes_deleted: u64,
    pub videos_deleted: u64,
}

pub async fn insert(db: &SqlitePool, new: &NewChannel) -> Result<Channel, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Channel>(
        r#"INSERT INTO channels (external_id, title, description, url, thumbnail_url, custom_url,
               subscriber_count, video_count, view_count, published_at, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
           RETURNING *"#,
    )
    .bind(&new.external_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.url)
    .bind(&new.thumbnail_url)
    .bind(&new.custom_url)
    .bind(new.subscriber_count)
    .bind(new.video_count)
    .bind(new.view_count)
    .bind(new.published_at)
    .bind(now)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_external_id(
    db: &SqlitePool,
    external_id: &str,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_url(db: &SqlitePool, url: &str) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE url = $1")
        .bind(url)
        .fetch_optional(db)
        .await
}

pub async fn list_all(db: &SqlitePool) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels ORDER BY created_at DESC, id DESC")
        .fetch_all(db)
        .await
}

/// Deletes the channel's jobs, notes and videos, then the channel itself, in one
/// transaction. Returns `None` when the channel does not exist.
#[tracing::instrument(name = "Delete channel with videos", skip(db))]
pub async fn delete_cascade(
    db: &SqlitePool,
    channel_id: i64,
) -> Result<Option<ChannelDeletion>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let jobs = sqlx::query(
        "DELETE FROM transcription_jobs WHERE video_id IN (SELECT id FROM videos WHERE channel_id = $1)",
    )
    .bind(channel_id)
    .execute(&mut *tx)
    .await?;

    let notes = sqlx::query(
        "DELETE FROM notes WHERE video_id IN (SELECT id FROM videos WHERE channel_id = $1)",
    )
    .bind(channel_id)
    .execute(&mut *tx)
    .await?;

    let videos = sqlx::query("DELETE FROM videos WHERE channel_id = $1")
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;

    let channel = sqlx::query("DELETE FROM channels WHERE id = $1")
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;

    if channel.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    tx.commit().await?;

    let deletion = ChannelDeletion {
        jobs_deleted: jobs.rows_affected(),
        notes_deleted: notes.rows_affected(),
        videos_deleted: videos.rows_affected(),
    };
    tracing::info!(
        "Deleted channel {}: {} videos, {} jobs, {} notes",
        channel_id,
        deletion.videos_deleted,
        deletion.jobs_deleted,
        deletion.notes_deleted
    );
    Ok(Some(deletion))
}

#[cfg(test)]
pub(crate) fn sample(external_id: &str) -> NewChannel {
    NewChannel {
        external_id: external_id.to_string(),
        title: format!("Channel {external_id}"),
        url: format!("https://www.youtube.com/channel/{external_id}"),
        ..Default::default()
    }
}
