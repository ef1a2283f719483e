//! HTTP API layer.
//!
//! - **[`handlers`]**: Axum route handlers for the upload, download and health endpoints
//! - **[`models`]**: Response bodies shared by both framework bindings
//!
//! # Routes
//!
//! - `POST /upload/{filename}`: store the request body (raw or `multipart/form-data`) under `filename`
//! - `GET /download/{filename}`: stream a stored file back as an attachment
//! - `GET /healthz`: liveness probe, always `OK`
//! - `GET /api-docs/openapi.json`: OpenAPI document for the routes above
//!
//! The header helpers below are shared with the actix-web binding so both produce identical
//! responses.

pub mod handlers;
pub mod models;

use crate::storage::FileName;

/// Multipart field carrying the file contents.
pub const UPLOAD_FIELD: &str = "file";

/// Whether a `Content-Type` header value announces a multipart form body.
pub fn is_multipart(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// `Content-Disposition` value for downloading `name` as an attachment.
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*` parameter.
pub fn content_disposition(name: &FileName) -> String {
    let raw = name.as_str();

    if raw.is_ascii() && !raw.contains('"') {
        return format!("attachment; filename=\"{}\"", raw);
    }

    let fallback: String = raw
        .chars()
        .map(|c| if c.is_ascii() && c != '"' { c } else { '_' })
        .collect();
    let encoded = url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A");

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_multipart() {
        assert!(is_multipart(Some("multipart/form-data; boundary=abc")));
        assert!(is_multipart(Some("Multipart/Form-Data;boundary=abc")));
        assert!(!is_multipart(Some("application/octet-stream")));
        assert!(!is_multipart(Some("text/plain")));
        assert!(!is_multipart(None));
    }

    #[test]
    fn test_content_disposition_ascii() {
        let name = FileName::parse("file_1.json").unwrap();
        assert_eq!(content_disposition(&name), "attachment; filename=\"file_1.json\"");
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let name = FileName::parse("résumé final.pdf").unwrap();
        assert_eq!(
            content_disposition(&name),
            "attachment; filename=\"r_sum_ final.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9%20final.pdf"
        );
    }

    #[test]
    fn test_content_disposition_quote() {
        let name = FileName::parse("say \"hi\".txt").unwrap();
        assert_eq!(
            content_disposition(&name),
            "attachment; filename=\"say _hi_.txt\"; filename*=UTF-8''say%20%22hi%22.txt"
        );
    }
}
