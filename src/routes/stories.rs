use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::Story;
use crate::storage;
use crate::AppState;

/// Ownership is decided against the stored record; the requesting client's
/// UI state carries no authority.
fn is_owner(story: &Story, user_id: &str) -> bool {
    story.user_id == user_id
}

#[derive(Default)]
struct StoryForm {
    name: Option<String>,
    category: Option<String>,
    story: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

async fn read_story_form(mut multipart: Multipart) -> Result<StoryForm, (StatusCode, &'static str)> {
    let mut form = StoryForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| (StatusCode::BAD_REQUEST, "Malformed form data"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("name") => {
                form.name = field.text().await.ok();
            }
            Some("category") => {
                form.category = field.text().await.ok();
            }
            Some("story") => {
                form.story = field.text().await.ok();
            }
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_default();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| (StatusCode::BAD_REQUEST, "Malformed form data"))?;
                if !bytes.is_empty() {
                    form.image = Some((content_type, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Uploads the story image and returns its public URL.
async fn store_image(
    state: &AppState,
    user_id: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<String, (StatusCode, &'static str)> {
    let Some(ext) = storage::extension_for(content_type) else {
        return Err((StatusCode::BAD_REQUEST, "Unsupported file type"));
    };
    let key = format!("stories/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    state.storage.write(&key, bytes).await.map_err(|e| {
        tracing::error!("Storage write failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error")
    })?;
    Ok(storage::object_url(&state.config.storage, &key))
}

pub async fn list_stories(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_stories(&state.db).await {
        Ok(stories) => AxumJson(stories).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> impl IntoResponse {
    let form = match read_story_form(multipart).await {
        Ok(f) => f,
        Err(rejection) => return rejection.into_response(),
    };

    let Some(text) = form.story.filter(|s| !s.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Story text is required").into_response();
    };

    let image = match form.image {
        Some((content_type, bytes)) => {
            match store_image(&state, &user.id, &content_type, bytes).await {
                Ok(url) => url,
                Err(rejection) => return rejection.into_response(),
            }
        }
        None => String::new(),
    };

    let now = chrono::Utc::now();
    let story = Story {
        id: Uuid::new_v4().to_string(),
        name: form.name.unwrap_or_else(|| user.name.clone()),
        category: form
            .category
            .unwrap_or_else(|| "General Support".to_string()),
        story: text,
        image,
        user_id: user.id,
        date: now.format("%Y-%m-%d").to_string(),
        created_at: now,
    };

    if let Err(e) = db::create_story(&state.db, &story).await {
        tracing::error!("DB Error: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    (StatusCode::CREATED, AxumJson(story)).into_response()
}

pub async fn update_story(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> impl IntoResponse {
    let mut story = match db::get_story(&state.db, &id).await {
        Ok(Some(s)) => s,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if !is_owner(&story, &user.id) {
        return (StatusCode::FORBIDDEN, "Not authorized to edit this story").into_response();
    }

    let form = match read_story_form(multipart).await {
        Ok(f) => f,
        Err(rejection) => return rejection.into_response(),
    };

    if let Some(name) = form.name.filter(|s| !s.trim().is_empty()) {
        story.name = name;
    }
    if let Some(category) = form.category.filter(|s| !s.trim().is_empty()) {
        story.category = category;
    }
    if let Some(text) = form.story.filter(|s| !s.trim().is_empty()) {
        story.story = text;
    }
    if let Some((content_type, bytes)) = form.image {
        match store_image(&state, &user.id, &content_type, bytes).await {
            Ok(url) => story.image = url,
            Err(rejection) => return rejection.into_response(),
        }
    }

    match db::replace_story(&state.db, &story).await {
        Ok(true) => AxumJson(story).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_story(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let story = match db::get_story(&state.db, &id).await {
        Ok(Some(s)) => s,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if !is_owner(&story, &user.id) {
        return (StatusCode::FORBIDDEN, "Not authorized to delete this story").into_response();
    }

    match db::delete_story(&state.db, &id).await {
        Ok(true) => AxumJson(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_author_owns_a_story() {
        let story = Story {
            id: "s-1".to_string(),
            name: "Asha".to_string(),
            category: "Education".to_string(),
            story: "We made it through.".to_string(),
            image: String::new(),
            user_id: "u-1".to_string(),
            date: "2026-08-06".to_string(),
            created_at: chrono::Utc::now(),
        };
        assert!(is_owner(&story, "u-1"));
        assert!(!is_owner(&story, "u-2"));
    }
}
