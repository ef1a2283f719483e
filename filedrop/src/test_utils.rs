//! Helpers for building an application against a throwaway upload directory.

use crate::config::{Config, FilesConfig};
use axum_test::TestServer;
use std::path::Path;
use tempfile::TempDir;

pub fn create_test_config(dir: &Path, max_upload_size: u64) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        files: FilesConfig {
            upload_dir: dir.join("uploads"),
            max_upload_size,
            download_buffer_size: 4096,
        },
        ..Default::default()
    }
}

/// Spin up the axum router on an in-memory transport. Keep the returned [`TempDir`] alive for
/// as long as the server is used.
pub async fn create_test_app(max_upload_size: u64) -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(dir.path(), max_upload_size);

    let app = crate::Application::new(config)
        .await
        .expect("Failed to create application");

    (app.into_test_server(), dir)
}
