use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::common::MessageResponse;
use crate::entities::notes::{self, NewNote, Note, NoteUpdate};
use crate::entities::videos;
use crate::errors::AppError;
use crate::InnerState;

fn check_span(start_time: f64, end_time: Option<f64>) -> Result<(), AppError> {
    if !start_time.is_finite() || start_time < 0.0 {
        return Err(AppError::Validation("startTime must be a non-negative number".into()));
    }
    if let Some(end) = end_time {
        if !end.is_finite() || end < start_time {
            return Err(AppError::Validation("endTime must not be before startTime".into()));
        }
    }
    Ok(())
}

fn check_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Note content must not be empty".into()));
    }
    Ok(())
}

async fn require_video(inner: &InnerState, video_id: i64) -> Result<(), AppError> {
    match videos::find_by_id(&inner.db, video_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Video {} not found", video_id))),
    }
}

#[tracing::instrument(name = "Get video notes", skip(inner))]
pub async fn video_notes(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<Json<Vec<Note>>, AppError> {
    require_video(&inner, video_id).await?;
    Ok(Json(notes::list_by_video(&inner.db, video_id).await?))
}

#[tracing::instrument(name = "Create note", skip(inner, new_note))]
pub async fn create_note(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
    Json(new_note): Json<NewNote>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    require_video(&inner, video_id).await?;
    check_span(new_note.start_time, new_note.end_time)?;
    check_content(&new_note.content)?;

    let note = notes::insert(&inner.db, video_id, &new_note).await?;
    tracing::info!("create_note: note {} on video {} at {}s", note.id, video_id, note.start_time);
    Ok((StatusCode::CREATED, Json(note)))
}

#[tracing::instrument(name = "Update note", skip(inner, changes))]
pub async fn update_note(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
    Json(changes): Json<NoteUpdate>,
) -> Result<Json<Note>, AppError> {
    let current = notes::find_by_id(&inner.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {} not found", id)))?;

    check_span(
        changes.start_time.unwrap_or(current.start_time),
        changes.end_time.unwrap_or(current.end_time),
    )?;
    if let Some(content) = &changes.content {
        check_content(content)?;
    }

    notes::update(&inner.db, id, &changes)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Note {} not found", id)))
}

#[tracing::instrument(name = "Delete note", skip(inner))]
pub async fn delete_note(
    State(inner): State<InnerState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !notes::delete(&inner.db, id).await? {
        return Err(AppError::NotFound(format!("Note {} not found", id)));
    }
    Ok(Json(MessageResponse::new("Note deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::entities::videos;
    use crate::test_support::test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_notes_require_existing_video() {
        let app = test_app().await;

        let (status, _) = app.send("GET", "/api/v1/videos/42/notes", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send("POST", "/api/v1/videos/42/notes", Some(json!({ "startTime": 1.0, "content": "x" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let app = test_app().await;
        let video = videos::insert(&app.state.db, &videos::sample("abcdefghijk", None)).await.unwrap();
        let base = format!("/api/v1/videos/{}/notes", video.id);

        for (start, content) in [(42.0, "later"), (3.5, "earlier")] {
            let (status, _) = app
                .send("POST", &base, Some(json!({ "startTime": start, "content": content })))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _) = app
            .send("POST", &base, Some(json!({ "startTime": 10.0, "endTime": 5.0, "content": "bad" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = app.send("GET", &base, None).await;
        let list = list.as_array().unwrap().clone();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["content"], "earlier");

        let note_id = list[1]["id"].as_i64().unwrap();
        let (status, updated) = app
            .send(
                "PUT",
                &format!("/api/v1/notes/{note_id}"),
                Some(json!({ "content": "edited", "selectedText": "some words" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["content"], "edited");
        assert_eq!(updated["startTime"], 42.0);
        assert_eq!(updated["selectedText"], "some words");

        let (status, cleared) = app
            .send(
                "PUT",
                &format!("/api/v1/notes/{note_id}"),
                Some(json!({ "selectedText": null })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared["selectedText"].is_null());
        assert_eq!(cleared["content"], "edited");

        let (status, body) = app.send("DELETE", &format!("/api/v1/notes/{note_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Note deleted successfully");

        let (status, _) = app.send("DELETE", &format!("/api/v1/notes/{note_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
