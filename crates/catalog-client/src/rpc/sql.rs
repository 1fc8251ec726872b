//! SQL query surface, driven as an opaque polling collaborator: submit a
//! query, poll its status to a terminal state, fetch the raw result bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::error::Result;
use crate::http::Transport;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SqlExecuteRequest {
    pub query: String,
    pub dialect: SqlDialect,
    pub serialization_protocol: SerializationProtocol,
    pub fallback_branch_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlDialect {
    Ansi,
    Spark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerializationProtocol {
    Arrow,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SqlExecuteResponse {
    pub query_id: String,
    pub status: QueryStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SqlGetStatusResponse {
    pub status: QueryStatus,
}

/// Status of a submitted query.
///
/// Closed union: `Ready`, `Canceled`, and `Failed` are terminal; `Running`
/// means "poll again".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryStatus {
    Ready,
    Running,
    Canceled,
    #[serde(rename_all = "camelCase")]
    Failed {
        #[serde(default)]
        error_message: Option<String>,
        failure_reason: String,
    },
}

impl QueryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Running)
    }
}

pub(crate) async fn execute(t: &Transport, request: &SqlExecuteRequest) -> Result<SqlExecuteResponse> {
    t.post_json("/queries/execute", request).await
}

pub(crate) async fn get_status(t: &Transport, query_id: &str) -> Result<SqlGetStatusResponse> {
    let path = format!("/queries/{}/status", encode(query_id));
    t.get_json(&path).await
}

/// Fetch the raw result byte stream for a ready query.
pub(crate) async fn get_results(t: &Transport, query_id: &str) -> Result<Bytes> {
    let path = format!("/queries/{}/results", encode(query_id));
    t.get_bytes(&path).await
}
