//! Data-proxy surface: file content transfer and concatenation tasks.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::Result;
use crate::http::Transport;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartConcatenationTaskRequest {
    pub destination_path: String,
    pub source_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartConcatenationTaskResponse {
    pub concatenation_task_id: String,
}

/// Point-in-time status report for a concatenation task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatenationTaskStatusReport {
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
    pub status: ConcatenationTaskStatus,
}

/// Status of a server-side concatenation task.
///
/// Closed union: `Success` and `Failure` are terminal; `Queued` and
/// `InProgress` mean "poll again". Matching is exhaustive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConcatenationTaskStatus {
    Success,
    #[serde(rename_all = "camelCase")]
    Failure {
        error_message: String,
        #[serde(default)]
        concatenated_files_count: u64,
        #[serde(default)]
        deleted_files_count: u64,
        #[serde(default)]
        total_files_count: u64,
    },
    Queued,
    #[serde(rename_all = "camelCase")]
    InProgress {
        concatenated_files_count: u64,
        deleted_files_count: u64,
        total_files_count: u64,
    },
}

impl ConcatenationTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConcatenationTaskStatus::Success | ConcatenationTaskStatus::Failure { .. }
        )
    }
}

/// Fetch the content of a file resolved within a view.
pub(crate) async fn get_file_in_view(
    t: &Transport,
    dataset_rid: &str,
    end_ref: &str,
    logical_path: &str,
    start_transaction_rid: Option<&str>,
) -> Result<Bytes> {
    let mut path = format!(
        "/dataproxy/datasets/{}/views/{}/content?logicalPath={}",
        encode(dataset_rid),
        encode(end_ref),
        encode(logical_path)
    );
    if let Some(start) = start_transaction_rid {
        path.push_str(&format!("&startTransactionRid={}", encode(start)));
    }
    t.get_bytes(&path).await
}

/// Upload file content into an open transaction.
pub(crate) async fn put_file(
    t: &Transport,
    dataset_rid: &str,
    transaction_rid: &str,
    logical_path: &str,
    content: Bytes,
) -> Result<()> {
    let path = format!(
        "/dataproxy/datasets/{}/transactions/{}/putFile?logicalPath={}",
        encode(dataset_rid),
        encode(transaction_rid),
        encode(logical_path)
    );
    t.post_bytes(&path, content).await
}

pub(crate) async fn start_concatenation_task(
    t: &Transport,
    dataset_rid: &str,
    transaction_rid: &str,
    request: &StartConcatenationTaskRequest,
) -> Result<StartConcatenationTaskResponse> {
    let path = format!(
        "/dataproxy/concatenation-tasks/datasets/{}/transactions/{}/start",
        encode(dataset_rid),
        encode(transaction_rid)
    );
    t.post_json(&path, request).await
}

pub(crate) async fn get_concatenation_task_status(
    t: &Transport,
    concatenation_task_id: &str,
) -> Result<ConcatenationTaskStatusReport> {
    let path = format!(
        "/dataproxy/concatenation-tasks/tasks/{}/status-report",
        encode(concatenation_task_id)
    );
    t.get_json(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_union_all_variants() {
        let success: ConcatenationTaskStatus =
            serde_json::from_str(r#"{"type": "success"}"#).unwrap();
        assert_eq!(success, ConcatenationTaskStatus::Success);
        assert!(success.is_terminal());

        let queued: ConcatenationTaskStatus =
            serde_json::from_str(r#"{"type": "queued"}"#).unwrap();
        assert_eq!(queued, ConcatenationTaskStatus::Queued);
        assert!(!queued.is_terminal());

        let in_progress: ConcatenationTaskStatus = serde_json::from_str(
            r#"{
                "type": "inProgress",
                "concatenatedFilesCount": 1,
                "deletedFilesCount": 0,
                "totalFilesCount": 3
            }"#,
        )
        .unwrap();
        assert!(!in_progress.is_terminal());
        match in_progress {
            ConcatenationTaskStatus::InProgress {
                concatenated_files_count,
                total_files_count,
                ..
            } => {
                assert_eq!(concatenated_files_count, 1);
                assert_eq!(total_files_count, 3);
            }
            other => panic!("expected InProgress, got {other:?}"),
        }

        let failure: ConcatenationTaskStatus =
            serde_json::from_str(r#"{"type": "failure", "errorMessage": "boom"}"#).unwrap();
        assert!(failure.is_terminal());
        match failure {
            ConcatenationTaskStatus::Failure { error_message, .. } => {
                assert_eq!(error_message, "boom");
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    #[test]
    fn test_status_report_deserialize() {
        let report: ConcatenationTaskStatusReport = serde_json::from_str(
            r#"{"reportedAt": "2024-03-01T08:00:00Z", "status": {"type": "success"}}"#,
        )
        .unwrap();
        assert!(report.reported_at.is_some());
        assert_eq!(report.status, ConcatenationTaskStatus::Success);
    }

    #[test]
    fn test_unknown_status_variant_rejected() {
        let result: std::result::Result<ConcatenationTaskStatus, _> =
            serde_json::from_str(r#"{"type": "paused"}"#);
        assert!(result.is_err());
    }
}
