use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::auth::models::AuthenticatedUser;
use crate::db::models::Incident;
use crate::error::AppError;
use crate::services::incidents::{
    self, AttachmentResponse, CreateIncidentRequest, IncidentListParams, UpdateStatusRequest,
};

pub async fn list_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<IncidentListParams>,
) -> Result<axum::Json<Vec<Incident>>, AppError> {
    Ok(axum::Json(incidents::list(&state, &user, params).await?))
}

pub async fn create_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateIncidentRequest>,
) -> Result<(StatusCode, axum::Json<Incident>), AppError> {
    let incident = incidents::create(&state, &user, request).await?;
    Ok((StatusCode::CREATED, axum::Json(incident)))
}

pub async fn get_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<Incident>, AppError> {
    Ok(axum::Json(incidents::get(&state, &user, &id).await?))
}

/// Axum handler for `PATCH /api/incidents/{id}/status`.
pub async fn update_status_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<axum::Json<Incident>, AppError> {
    Ok(axum::Json(incidents::update_status(&state, &user, &id, request).await?))
}

/// Axum handler for `POST /api/incidents/{id}/attachments`.
///
/// Accepts a multipart form with a single file field named "file".
pub async fn upload_attachment_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path(id): axum::extract::Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, axum::Json<AttachmentResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("attachment.bin").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let response =
            incidents::attach_file(&state, &user, &id, &file_name, &content_type, data.to_vec()).await?;
        return Ok((StatusCode::CREATED, axum::Json(response)));
    }

    Err(AppError::BadRequest("No file field found in request".into()))
}

/// Axum handler for `GET /api/incidents/{id}/attachments/{name}`.
///
/// Streams the stored file back with the media type it was uploaded with.
pub async fn download_attachment_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    user: AuthenticatedUser,
    axum::extract::Path((id, name)): axum::extract::Path<(String, String)>,
) -> Result<axum::response::Response, AppError> {
    let object = incidents::get_attachment(&state, &user, &id, &name).await?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, object.content_type)],
        object.content,
    )
        .into_response())
}
