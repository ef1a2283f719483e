use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{FileName, UploadSummary};

/// Acknowledgement returned after an upload has been stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Always "File uploaded successfully"
    pub message: String,
    pub filename: String,
    /// Number of bytes written to storage
    pub bytes: u64,
}

impl UploadResponse {
    pub fn new(name: &FileName, summary: UploadSummary) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            filename: name.to_string(),
            bytes: summary.bytes,
        }
    }
}
