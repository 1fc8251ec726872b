//! Catalog service surface: datasets, branches, views, and transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::Result;
use crate::http::Transport;
use crate::types::{TransactionStatus, TransactionType};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDatasetRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetResponse {
    pub rid: String,
}

#[derive(Debug, Serialize, Default)]
struct CreateBranchRequest {}

/// A resolved transaction range for a dataset view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRange {
    pub start_transaction_rid: String,
    pub end_transaction_rid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartTransactionRequest<'a> {
    branch_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetTransactionTypeRequest {
    #[serde(rename = "type")]
    txn_type: TransactionType,
}

#[derive(Debug, Serialize, Default)]
struct CloseTransactionRequest {}

/// Who performed an operation, and when.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub time: DateTime<Utc>,
    pub user_id: String,
}

/// A transaction as reported by the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub rid: String,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attribution: Option<Attribution>,
}

/// One file entry in a view listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub logical_path: String,
    #[serde(default)]
    pub time_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_rid: Option<String>,
    #[serde(default)]
    pub file_metadata: Option<FileMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub length: u64,
}

/// One page of a view file listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesPage {
    #[serde(default)]
    pub values: Vec<FileEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

pub(crate) async fn create_dataset(t: &Transport, path: &str) -> Result<DatasetResponse> {
    t.post_json("/catalog/datasets", &CreateDatasetRequest { path })
        .await
}

pub(crate) async fn create_branch(t: &Transport, dataset_rid: &str, branch_id: &str) -> Result<()> {
    let path = format!(
        "/catalog/datasets/{}/branches/{}",
        encode(dataset_rid),
        encode(branch_id)
    );
    t.post_unit(&path, &CreateBranchRequest::default()).await
}

/// Resolve the transaction range of a view. Returns `None` when the branch
/// exists but has never had a committed transaction.
pub(crate) async fn get_view_range(
    t: &Transport,
    dataset_rid: &str,
    end_ref: &str,
    include_open_transaction: bool,
) -> Result<Option<TransactionRange>> {
    let path = format!(
        "/catalog/datasets/{}/views2/{}/range?includeOpenExclusiveTransaction={}",
        encode(dataset_rid),
        encode(end_ref),
        include_open_transaction
    );
    t.get_json_opt(&path).await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn get_view_files(
    t: &Transport,
    dataset_rid: &str,
    start_transaction_rid: Option<&str>,
    end_ref: &str,
    logical_path: Option<&str>,
    include_open_transaction: bool,
    page_size: u32,
    page_token: Option<&str>,
) -> Result<ListFilesPage> {
    let mut path = format!(
        "/catalog/datasets/{}/views2/{}/files?pageSize={}&excludeHiddenFiles=true&includeOpenExclusiveTransaction={}",
        encode(dataset_rid),
        encode(end_ref),
        page_size,
        include_open_transaction
    );
    if let Some(start) = start_transaction_rid {
        path.push_str(&format!("&startTransactionRid={}", encode(start)));
    }
    if let Some(prefix) = logical_path {
        path.push_str(&format!("&logicalPath={}", encode(prefix)));
    }
    if let Some(token) = page_token {
        path.push_str(&format!("&pageStartLogicalPath={}", encode(token)));
    }
    t.get_json(&path).await
}

pub(crate) async fn start_transaction(
    t: &Transport,
    dataset_rid: &str,
    branch_id: &str,
) -> Result<TransactionResponse> {
    let path = format!("/catalog/datasets/{}/transactions", encode(dataset_rid));
    t.post_json(&path, &StartTransactionRequest { branch_id })
        .await
}

pub(crate) async fn set_transaction_type(
    t: &Transport,
    dataset_rid: &str,
    transaction_rid: &str,
    txn_type: TransactionType,
) -> Result<TransactionResponse> {
    let path = format!(
        "/catalog/datasets/{}/transactions/{}",
        encode(dataset_rid),
        encode(transaction_rid)
    );
    t.post_json(&path, &SetTransactionTypeRequest { txn_type })
        .await
}

pub(crate) async fn commit_transaction(
    t: &Transport,
    dataset_rid: &str,
    transaction_rid: &str,
) -> Result<()> {
    let path = format!(
        "/catalog/datasets/{}/transactions/{}/commit",
        encode(dataset_rid),
        encode(transaction_rid)
    );
    t.post_unit(&path, &CloseTransactionRequest::default())
        .await
}

pub(crate) async fn abort_transaction(
    t: &Transport,
    dataset_rid: &str,
    transaction_rid: &str,
) -> Result<()> {
    let path = format!(
        "/catalog/datasets/{}/transactions/{}/abort",
        encode(dataset_rid),
        encode(transaction_rid)
    );
    t.post_unit(&path, &CloseTransactionRequest::default())
        .await
}
