//! Full benchmark run against an in-process filedrop server.

use filedrop::{AppState, config::FilesConfig, storage::LocalFileStorage};
use filedrop_benchmark::{BenchmarkConfig, ServerConfig, report, run_rounds};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_filedrop(upload_dir: &Path) -> String {
    let config = filedrop::Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        files: FilesConfig {
            upload_dir: upload_dir.to_path_buf(),
            max_upload_size: 1024 * 1024,
            download_buffer_size: 4096,
        },
        ..Default::default()
    };

    let storage = LocalFileStorage::from_config(&config.files);
    storage.ensure_dir().await.unwrap();
    let state = AppState::builder().config(config).storage(Arc::new(storage)).build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, filedrop::build_router(state)).await.unwrap();
    });

    format!("http://{}", addr)
}

fn write_data(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for n in 1..=3 {
        std::fs::write(dir.join(format!("file_{}.json", n)), format!(r#"{{"id":{}}}"#, n)).unwrap();
    }
    std::fs::write(dir.join("large_text_file.txt"), "line of text\n".repeat(2000)).unwrap();
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_rounds_against_live_server() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let upload_dir = dir.path().join("uploads");
    write_data(&data_dir);

    let url = spawn_filedrop(&upload_dir).await;

    let config = BenchmarkConfig {
        servers: vec![
            ServerConfig {
                name: "filedrop_axum".to_string(),
                url,
                command: None,
                env: BTreeMap::new(),
            },
            ServerConfig {
                name: "offline".to_string(),
                url: "http://127.0.0.1:1".to_string(),
                command: None,
                env: BTreeMap::new(),
            },
        ],
        data_dir: data_dir.clone(),
        record_count: 3,
        include_large_file: true,
        rounds: 2,
        files_per_round: 2,
        concurrency: 0,
        uploads_dir: None,
        results_dir: dir.path().join("results"),
        request_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    config.validate().unwrap();

    let client = reqwest::Client::builder().timeout(config.request_timeout).build().unwrap();
    let results = run_rounds(&config, &client).await.unwrap();

    assert_eq!(results.failures, 0);
    for series in [&results.upload, &results.download, &results.upload_parallel, &results.download_parallel] {
        let entries = series.entries();
        assert_eq!(entries[0].0, "filedrop_axum");
        assert_eq!(entries[0].1.len(), 2);
        // The unreachable server is skipped every round
        assert_eq!(entries[1].0, "offline");
        assert!(entries[1].1.is_empty());
    }

    // Round two covered all four files
    for name in ["file_1.json", "file_2.json", "file_3.json", "large_text_file.txt"] {
        assert_eq!(
            std::fs::read(upload_dir.join(name)).unwrap(),
            std::fs::read(data_dir.join(name)).unwrap(),
            "{name} differs after upload"
        );
    }

    let (sequential, concurrent) = report::write_results(&config.results_dir, &results).unwrap();

    let text = std::fs::read_to_string(sequential).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Server up,1,2");
    assert!(lines[1].starts_with("filedrop_axum,"));
    assert_eq!(lines[2], "offline");
    assert_eq!(lines[3], "");
    assert_eq!(lines[4], "Server dw,1,2");

    let text = std::fs::read_to_string(concurrent).unwrap();
    assert!(text.starts_with("Server up (parallel),1,2\n"));
    assert!(text.contains("\n\nServer dw (parallel),1,2\n"));
}

#[test_log::test(tokio::test)]
async fn test_missing_data_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    let config = BenchmarkConfig {
        servers: vec![ServerConfig {
            name: "filedrop_axum".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            command: None,
            env: BTreeMap::new(),
        }],
        data_dir: dir.path().join("empty"),
        record_count: 1,
        rounds: 1,
        ..Default::default()
    };

    let err = run_rounds(&config, &reqwest::Client::new()).await.unwrap_err();
    assert!(err.to_string().contains("file_1.json"));
}
