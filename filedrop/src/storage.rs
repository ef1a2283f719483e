//! Flat on-disk storage for uploaded files.
//!
//! Every file lives directly under the upload directory, keyed by its caller-supplied
//! [`FileName`]. Uploads are streamed into a hidden temporary file next to the target and
//! renamed into place once the body is complete, so a download never observes a partially
//! written file and a failed upload leaves the previous version untouched.

use crate::config::FilesConfig;
use crate::errors::{Error, Result};
use anyhow::Context;
use futures::{Stream, StreamExt};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Longest accepted file name, in bytes (the common filesystem limit).
pub const MAX_FILE_NAME_LEN: usize = 255;

const TEMP_PREFIX: &str = ".upload-";
const TEMP_SUFFIX: &str = ".part";

/// A validated storage key.
///
/// Names are used verbatim as a single path component under the upload directory, so anything
/// that could escape it or collide with in-progress temporaries is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn parse(raw: &str) -> Result<Self> {
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if raw.len() > MAX_FILE_NAME_LEN {
            Some("must be at most 255 bytes")
        } else if raw.starts_with('.') {
            Some("must not start with '.'")
        } else if raw.contains(['/', '\\']) {
            Some("must not contain path separators")
        } else if raw.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::BadRequest {
                message: format!("Invalid file name '{}': {}", raw.escape_default(), reason),
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub bytes: u64,
    pub chunks: u64,
}

/// An opened stored file, ready to be streamed back.
#[derive(Debug)]
pub struct StoredFile {
    pub file: File,
    pub len: u64,
}

/// Local filesystem storage backend - stores files flat in one directory
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_path: PathBuf,
    max_upload_size: u64,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf, max_upload_size: u64) -> Self {
        Self {
            base_path,
            max_upload_size,
        }
    }

    pub fn from_config(config: &FilesConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.max_upload_size)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .with_context(|| format!("create upload directory {}", self.base_path.display()))?;
        Ok(())
    }

    fn path_for(&self, name: &FileName) -> PathBuf {
        self.base_path.join(name.as_str())
    }

    /// Stream a request body into `name`, replacing any existing file once the body is complete.
    ///
    /// Body read errors are reported as [`Error::BadRequest`]; exceeding the size cap as
    /// [`Error::PayloadTooLarge`]. In both cases nothing is left on disk.
    pub async fn write_stream<S, B, E>(&self, name: &FileName, body: S) -> Result<UploadSummary>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: fmt::Display,
    {
        let mut body = pin!(body);
        let mut upload = self.begin_upload(name).await?;

        let streamed = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read upload body: {}", e),
                })?;
                upload.write_chunk(chunk.as_ref()).await?;
            }
            Ok::<(), Error>(())
        }
        .await;

        match streamed {
            Ok(()) => upload.commit().await,
            Err(e) => {
                upload.discard().await;
                Err(e)
            }
        }
    }

    async fn begin_upload(&self, name: &FileName) -> Result<PendingUpload> {
        let temp_path = self
            .base_path
            .join(format!("{}{}{}", TEMP_PREFIX, uuid::Uuid::new_v4(), TEMP_SUFFIX));

        let file = File::create(&temp_path)
            .await
            .with_context(|| format!("create temporary upload file {}", temp_path.display()))?;

        Ok(PendingUpload {
            name: name.clone(),
            file: Some(file),
            temp_path,
            final_path: self.path_for(name),
            limit: self.max_upload_size,
            written: 0,
            chunks: 0,
            finished: false,
        })
    }

    /// Open a stored file for reading. Returns `None` when nothing is stored under `name`.
    pub async fn open(&self, name: &FileName) -> Result<Option<StoredFile>> {
        let path = self.path_for(name);

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow::Error::from(e).context(format!("open {}", path.display())).into()),
        };

        let metadata = file
            .metadata()
            .await
            .with_context(|| format!("read metadata of {}", path.display()))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(StoredFile {
            file,
            len: metadata.len(),
        }))
    }
}

/// An upload in progress. Dropping it without [`PendingUpload::commit`] removes the temporary
/// file, which also covers handlers cancelled by a client disconnect.
struct PendingUpload {
    name: FileName,
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    limit: u64,
    written: u64,
    chunks: u64,
    finished: bool,
}

impl PendingUpload {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let chunk_size = chunk.len() as u64;

        if self.written + chunk_size > self.limit {
            tracing::warn!(
                filename = %self.name,
                written = self.written,
                max_upload_size = self.limit,
                "Upload size limit exceeded, aborting upload"
            );
            return Err(Error::PayloadTooLarge {
                message: format!("File size exceeds maximum allowed size of {} bytes", self.limit),
            });
        }

        let file = self.file.as_mut().ok_or_else(|| Error::Internal {
            operation: format!("write to already finished upload of {}", self.name),
        })?;
        file.write_all(chunk)
            .await
            .with_context(|| format!("write upload chunk to {}", self.temp_path.display()))?;

        self.written += chunk_size;
        self.chunks += 1;

        tracing::trace!(
            filename = %self.name,
            chunk_number = self.chunks,
            chunk_size = chunk_size,
            total_size = self.written,
            "Wrote chunk"
        );

        Ok(())
    }

    async fn commit(mut self) -> Result<UploadSummary> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .with_context(|| format!("flush {}", self.temp_path.display()))?;
        }

        fs::rename(&self.temp_path, &self.final_path)
            .await
            .with_context(|| format!("move upload into place at {}", self.final_path.display()))?;
        self.finished = true;

        Ok(UploadSummary {
            bytes: self.written,
            chunks: self.chunks,
        })
    }

    /// Close and remove the temporary file of a failed upload.
    async fn discard(mut self) {
        self.file.take();
        let removed = fs::remove_file(&self.temp_path).await;
        log_removal(&self.temp_path, removed);
        self.finished = true;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.file.take();

        let temp_path = std::mem::take(&mut self.temp_path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let removed = fs::remove_file(&temp_path).await;
                    log_removal(&temp_path, removed);
                });
            }
            Err(_) => {
                let removed = std::fs::remove_file(&temp_path);
                log_removal(&temp_path, removed);
            }
        }
    }
}

fn log_removal(path: &Path, removed: io::Result<()>) {
    if let Err(e) = removed
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary upload file");
    }
}
