//! actix-web binding of the HTTP surface.
//!
//! Routes, status codes, headers and bodies match the axum handlers in [`crate::api::handlers`];
//! only the framework plumbing differs. Both bindings share [`AppState`] and the storage layer.

use crate::AppState;
use crate::api::models::files::UploadResponse;
use crate::api::{UPLOAD_FIELD, content_disposition, is_multipart};
use crate::errors::Error;
use crate::openapi::ApiDoc;
use crate::storage::FileName;
use actix_multipart::Multipart;
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, ResponseError,
    http::{StatusCode, header},
    middleware::Logger,
    web,
};
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing::info;
use utoipa::OpenApi;

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        // actix-web and axum sit on different `http` major versions
        StatusCode::from_u16(Error::status_code(self).as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        HttpResponse::build(ResponseError::status_code(self))
            .content_type("text/plain; charset=utf-8")
            .body(self.user_message())
    }
}

async fn upload_file(
    state: web::Data<AppState>,
    filename: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<web::Json<UploadResponse>, Error> {
    let name = FileName::parse(&filename)?;

    let multipart = is_multipart(
        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );

    let summary = if multipart {
        let mut form = Multipart::new(req.headers(), payload);

        let field = loop {
            let next = form.try_next().await.map_err(|e| Error::BadRequest {
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
        state.storage.write_stream(&name, payload).await?
    };

    info!(filename = %name, bytes = summary.bytes, chunks = summary.chunks, multipart, "File uploaded");

    Ok(web::Json(UploadResponse::new(&name, summary)))
}

async fn download_file(state: web::Data<AppState>, filename: web::Path<String>) -> Result<HttpResponse, Error> {
    let name = FileName::parse(&filename)?;

    let stored = state.storage.open(&name).await?.ok_or_else(|| Error::NotFound {
        resource: "File".to_string(),
        id: name.to_string(),
    })?;

    let stream = ReaderStream::with_capacity(stored.file, state.config.files.download_buffer_size);

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .insert_header((header::CONTENT_DISPOSITION, content_disposition(&name)))
        .no_chunking(stored.len)
        .streaming(stream))
}

async fn health() -> &'static str {
    "OK"
}

async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Register every route on an actix-web app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload/{filename}", web::post().to(upload_file))
        .route("/download/{filename}", web::get().to(download_file))
        .route("/healthz", web::get().to(health))
        .route("/api-docs/openapi.json", web::get().to(openapi_json));
}

/// Run the actix-web server until `shutdown` resolves, then stop it gracefully.
pub async fn serve<F>(state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let bind_addr = state.config.bind_address();
    let port = state.config.port;
    let data = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    // Signals are handled by the caller's shutdown future
    .disable_signals()
    .bind(&bind_addr)?
    .run();

    info!(
        "filedrop (actix) listening on http://{}, available at http://localhost:{}",
        bind_addr, port
    );

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown.await;
        handle.stop(true).await;
    });

    server.await?;
    Ok(())
}
