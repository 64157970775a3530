use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: i64,
    pub external_id: String,
    pub channel_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub video_file_path: Option<String>,
    pub audio_file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub external_id: String,
    pub channel_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
}

pub async fn insert(db: &SqlitePool, new: &NewVideo) -> Result<Video, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Video>(
        r#"INSERT INTO videos (external_id, channel_id, title, description, url, thumbnail_url,
               duration_seconds, view_count, published_at, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
           RETURNING *"#,
    )
    .bind(&new.external_id)
    .bind(new.channel_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.url)
    .bind(&new.thumbnail_url)
    .bind(new.duration_seconds)
    .bind(new.view_count)
    .bind(new.published_at)
    .bind(now)
    .fetch_one(db)
    .await
}

/// Returns the stored video for `new.external_id`, inserting it first if needed.
pub async fn insert_if_absent(db: &SqlitePool, new: &NewVideo) -> Result<(Video, bool), sqlx::Error> {
    if let Some(existing) = find_by_external_id(db, &new.external_id).await? {
        return Ok((existing, false));
    }
    Ok((insert(db, new).await?, true))
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_external_id(
    db: &SqlitePool,
    external_id: &str,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(db)
        .await
}

pub async fn list_all(db: &SqlitePool) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>("SELECT * FROM videos ORDER BY published_at DESC, id DESC")
        .fetch_all(db)
        .await
}

pub async fn list_by_channel(db: &SqlitePool, channel_id: i64) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        "SELECT * FROM videos WHERE channel_id = $1 ORDER BY published_at DESC, id DESC",
    )
    .bind(channel_id)
    .fetch_all(db)
    .await
}

pub async fn set_video_file_path(db: &SqlitePool, id: i64, path: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE videos SET video_file_path = $1, updated_at = $2 WHERE id = $3")
        .bind(path)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_audio_file_path(db: &SqlitePool, id: i64, path: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE videos SET audio_file_path = $1, updated_at = $2 WHERE id = $3")
        .bind(path)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Deletes a video together with its jobs and notes. Returns false when the
/// video does not exist.
#[tracing::instrument(name = "Delete video", skip(db))]
pub async fn delete_cascade(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM transcription_jobs WHERE video_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM notes WHERE video_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}

#[cfg(test)]
pub(crate) fn sample(external_id: &str, channel_id: Option<i64>) -> NewVideo {
    NewVideo {
        external_id: external_id.to_string(),
        channel_id,
        title: format!("Video {external_id}"),
        url: format!("https://www.youtube.com/watch?v={external_id}"),
        ..Default::default()
    }
}
