use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A timestamped annotation on a video, optionally quoting a transcript span.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub video_id: i64,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub content: String,
    pub selected_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub content: String,
    pub selected_text: Option<String>,
}

/// Partial update; absent fields keep their stored value. `endTime` and
/// `selectedText` can be cleared with an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_time: Option<Option<f64>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub selected_text: Option<Option<String>>,
}

/// Present-but-null becomes `Some(None)`; a missing field stays `None` via `default`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub async fn insert(db: &SqlitePool, video_id: i64, new: &NewNote) -> Result<Note, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Note>(
        r#"INSERT INTO notes (video_id, start_time, end_time, content, selected_text, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $6)
           RETURNING *"#,
    )
    .bind(video_id)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(&new.content)
    .bind(&new.selected_text)
    .bind(now)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_by_video(db: &SqlitePool, video_id: i64) -> Result<Vec<Note>, sqlx::Error> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE video_id = $1 ORDER BY start_time, id")
        .bind(video_id)
        .fetch_all(db)
        .await
}

pub async fn update(
    db: &SqlitePool,
    id: i64,
    changes: &NoteUpdate,
) -> Result<Option<Note>, sqlx::Error> {
    let Some(current) = find_by_id(db, id).await? else {
        return Ok(None);
    };

    let note = sqlx::query_as::<_, Note>(
        r#"UPDATE notes
           SET start_time = $1, end_time = $2, content = $3, selected_text = $4, updated_at = $5
           WHERE id = $6
           RETURNING *"#,
    )
    .bind(changes.start_time.unwrap_or(current.start_time))
    .bind(changes.end_time.unwrap_or(current.end_time))
    .bind(changes.content.as_ref().unwrap_or(&current.content))
    .bind(changes.selected_text.clone().unwrap_or(current.selected_text))
    .bind(Utc::now())
    .bind(id)
    .fetch_one(db)
    .await?;

    Ok(Some(note))
}

pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) fn sample(start_time: f64) -> NewNote {
    NewNote {
        start_time,
        end_time: None,
        content: format!("note at {start_time}"),
        selected_text: None,
    }
}
