use std::io::Cursor;
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{error, info, warn};

use avatar_types::api::{ApiSuccess, HealthResponse, UserIdQuery, UserIdResponse};
use avatar_types::models::AvatarWrite;

use crate::error::AppError;
use crate::imaging::{self, ImageError};
use crate::store::{AvatarStore, UserDirectory};

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub avatars: Arc<dyn AvatarStore>,
    pub users: Arc<dyn UserDirectory>,
    /// Reported by `/health`.
    pub port: u16,
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET /api/profile-picture/{user_id} — raw JPEG bytes.
pub async fn get_profile_picture(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    check_user_id(user_id)?;

    let avatar = state
        .avatars
        .get_avatar(user_id)
        .await
        .map_err(|e| {
            error!("Error fetching profile picture for user {}: {:#}", user_id, e);
            AppError::Store(e)
        })?;

    match avatar {
        Some(avatar) if !avatar.image.is_empty() => {
            Ok(([(header::CONTENT_TYPE, "image/jpeg")], avatar.image).into_response())
        }
        _ => {
            warn!("No profile picture for user {}", user_id);
            Err(AppError::not_found("Profile picture not found"))
        }
    }
}

/// POST /api/profile-picture/{user_id} — multipart upload, field `file`.
///
/// The image is validated and normalized to JPEG before it touches the store.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiSuccess>, AppError> {
    check_user_id(user_id)?;

    // A non-multipart body has no file part at all.
    let multipart = multipart.map_err(|e| {
        warn!("Rejected upload for user {}: {}", user_id, e.body_text());
        AppError::validation("No file provided")
    })?;
    let (filename, data) = read_file_field(multipart).await.map_err(|e| {
        warn!("Rejected upload for user {}: {}", user_id, e);
        e
    })?;

    if filename.is_empty() {
        warn!("Rejected upload for user {}: empty filename", user_id);
        return Err(AppError::validation("No file selected"));
    }

    // Decode/encode is CPU-bound; keep it off the async workers.
    let image = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ImageError> {
        let mut reader = Cursor::new(data);
        imaging::validate_upload(Some(&filename), &mut reader)?;
        imaging::normalize(reader)
    })
    .await
    .map_err(|e| {
        error!("Image task failed for user {}: {}", user_id, e);
        AppError::Store(anyhow::anyhow!("image processing task failed: {e}"))
    })?
    .map_err(|e| {
        warn!("Rejected upload for user {}: {}", user_id, e);
        AppError::from(e)
    })?;

    let size = image.len();
    let outcome = state
        .avatars
        .put_avatar(user_id, image)
        .await
        .map_err(|e| {
            error!("Error uploading profile picture for user {}: {:#}", user_id, e);
            AppError::Store(e)
        })?;

    match outcome {
        AvatarWrite::Created => info!("Stored new profile picture for user {} ({} bytes)", user_id, size),
        AvatarWrite::Updated => info!("Replaced profile picture for user {} ({} bytes)", user_id, size),
    }

    Ok(Json(ApiSuccess::new("Profile picture uploaded successfully")))
}

/// GET /api/user-id?username=..&companyId=.. — resolve a user id.
pub async fn get_user_id(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<UserIdResponse>, AppError> {
    let username = query.username.filter(|s| !s.is_empty());
    let company_id = query.company_id.filter(|s| !s.is_empty());
    let (Some(username), Some(company_id)) = (username, company_id) else {
        warn!("Rejected user id lookup: missing username or companyId");
        return Err(AppError::validation("Missing username or companyId"));
    };

    let company_id: i64 = company_id.trim().parse().map_err(|_| {
        warn!("Rejected user id lookup: companyId {:?} is not an integer", company_id);
        AppError::validation("Invalid companyId")
    })?;

    let user_id = state
        .users
        .resolve_user_id(&username, company_id)
        .await
        .map_err(|e| {
            error!("Error getting user id for {}@{}: {:#}", username, company_id, e);
            AppError::Store(e)
        })?
        .ok_or_else(|| {
            warn!("No user {} in company {}", username, company_id);
            AppError::not_found("User not found")
        })?;

    Ok(Json(UserIdResponse {
        success: true,
        user_id,
    }))
}

/// GET /health — liveness check. Never touches either store.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            port: state.port,
        }),
    )
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Ids are non-negative, matching what the USERS table hands out.
fn check_user_id(user_id: i64) -> Result<(), AppError> {
    if user_id < 0 {
        warn!("Rejected request for negative user id {}", user_id);
        return Err(AppError::validation("Invalid user id"));
    }
    Ok(())
}

/// Pull the `file` part out of a multipart body, skipping any others.
///
/// A part without a filename is a plain form value, not a file, so a text
/// field that happens to be named `file` does not count.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, data));
    }
    Err(AppError::validation("No file provided"))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ImageError::TooLarge {
            size: crate::MAX_BODY_BYTES as u64,
        }
        .into()
    } else {
        AppError::validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}
