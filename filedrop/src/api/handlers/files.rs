use crate::AppState;
use crate::api::models::files::UploadResponse;
use crate::api::{UPLOAD_FIELD, content_disposition, is_multipart};
use crate::errors::{Error, Result};
use crate::storage::FileName;
use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

#[utoipa::path(
    post,
    path = "/upload/{filename}",
    tag = "files",
    summary = "Upload file",
    description = "Store the request body under `filename`, replacing any existing file. The body is either the raw \
                   file contents or a multipart form whose `file` field holds them.",
    params(("filename" = String, Path, description = "Name to store the file under")),
    request_body(
        content = Vec<u8>,
        content_type = "application/octet-stream",
        description = "File contents, or a multipart/form-data body with a `file` field"
    ),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Invalid file name or malformed body"),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all, fields(filename = %filename))]
pub async fn upload_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Json<UploadResponse>> {
    let name = FileName::parse(&filename)?;

    let multipart = is_multipart(
        request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );

    let summary = if multipart {
        let mut multipart = Multipart::from_request(request, &state).await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e),
        })?;

        let field = loop {
            let next = multipart.next_field().await.map_err(|e| Error::BadRequest {
                message: format!("Failed to parse multipart data: {}", e),
            })?;
            match next {
                Some(field) if field.name() == Some(UPLOAD_FIELD) => break field,
                Some(_) => continue,
                None => {
                    return Err(Error::BadRequest {
                        message: format!("Missing '{}' field in multipart body", UPLOAD_FIELD),
                    });
                }
            }
        };

        state.storage.write_stream(&name, field).await?
    } else {
        state.storage.write_stream(&name, request.into_body().into_data_stream()).await?
    };

    tracing::info!(bytes = summary.bytes, chunks = summary.chunks, multipart, "File uploaded");

    Ok(Json(UploadResponse::new(&name, summary)))
}

#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "files",
    summary = "Download file",
    description = "Stream a previously uploaded file back as an attachment.",
    params(("filename" = String, Path, description = "Name the file was stored under")),
    responses(
        (status = 200, description = "File contents as application/octet-stream"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all, fields(filename = %filename))]
pub async fn download_file(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response> {
    let name = FileName::parse(&filename)?;

    let stored = state.storage.open(&name).await?.ok_or_else(|| Error::NotFound {
        resource: "File".to_string(),
        id: name.to_string(),
    })?;

    tracing::debug!(bytes = stored.len, "Streaming file");

    let stream = ReaderStream::with_capacity(stored.file, state.config.files.download_buffer_size);
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&name)),
        (header::CONTENT_LENGTH, stored.len.to_string()),
    ];

    Ok((headers, Body::from_stream(stream)).into_response())
}

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    summary = "Liveness probe",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "OK"
}
