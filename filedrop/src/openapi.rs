//! OpenAPI document for the HTTP surface, served at `/api-docs/openapi.json` by both bindings.

use utoipa::OpenApi;

use crate::api::{handlers::files, models::files::UploadResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "filedrop",
        description = "Upload files by name and download them back, streamed to and from a flat directory."
    ),
    paths(files::upload_file, files::download_file, files::health),
    components(schemas(UploadResponse)),
    tags(
        (name = "files", description = "File upload and download"),
        (name = "health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;
