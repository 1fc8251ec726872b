//! Error types for the Atlas client SDK.

use serde::Deserialize;

use crate::types::TransactionStatus;

/// Structured error metadata returned by the remote service.
///
/// The name, parameters, and instance id are preserved exactly as the server
/// reported them; nothing is rewritten or retried on the client side.
#[derive(Debug, Clone, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("remote error '{error_name}' (status {status}, instance {error_instance_id:?}): {parameters:?}")]
pub struct RpcError {
    /// Remote error name, e.g. `OpenTransactionAlreadyExists`.
    pub error_name: String,
    /// Structured error parameters, unmodified.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Server-assigned id for this error instance.
    #[serde(default)]
    pub error_instance_id: Option<String>,
    /// HTTP status the error arrived with. Not part of the body.
    #[serde(skip)]
    pub status: u16,
}

/// Errors that can occur when using the Atlas client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, body read, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport error raised by the retry middleware
    #[error("HTTP request error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// Input is not a resource identifier
    #[error("not a resource identifier: '{0}'")]
    ParseRid(String),

    /// A resource identifier parsed, but does not name a dataset
    #[error("'{0}' is not a dataset rid")]
    NotADataset(String),

    /// Structured error reported by the remote service; never retried
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Resource not found (404 without a structured error body)
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication failed (401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied (403 without a structured error body)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Server error without a structured error body
    #[error("server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message from the server, or the status line
        message: String,
    },

    /// Response body could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A scoped transaction was aborted because its body failed; the
    /// original failure is attached as the cause
    #[error("transaction '{transaction_rid}' on '{dataset_rid}' aborted due to error")]
    TransactionAborted {
        transaction_rid: String,
        dataset_rid: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Commit or abort was attempted on a transaction in a terminal state.
    /// This is a caller bug, not a remote condition; it is never retried.
    #[error("transaction '{transaction_rid}' is {status}, expected OPEN")]
    TransactionNotOpen {
        transaction_rid: String,
        status: TransactionStatus,
    },

    /// A server-side concatenation task reported terminal failure
    #[error("{message}")]
    ConcatenationFailed { message: String },

    /// A SQL query reported terminal failure
    #[error("query failed ({reason}): {message}")]
    QueryFailed { reason: String, message: String },

    /// The configured poll bound was exhausted before a terminal status
    #[error("no terminal status after {attempts} poll attempts")]
    PollLimitExceeded { attempts: u32 },

    /// A read was attempted against a view with no end transaction
    #[error("dataset '{0}' has no committed data on this view")]
    UnresolvedView(String),
}

impl ClientError {
    /// The remote error name, when this error carries structured remote
    /// metadata. Useful for matching specific precondition violations such
    /// as `OpenTransactionAlreadyExists`.
    pub fn rpc_name(&self) -> Option<&str> {
        match self {
            ClientError::Rpc(rpc) => Some(&rpc.error_name),
            _ => None,
        }
    }

    /// Returns true if retrying the same request could plausibly succeed.
    /// Structured remote errors and caller bugs are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ServerError { status, .. } => *status >= 500,
            ClientError::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_preserves_metadata() {
        let body = r#"{
            "errorName": "OpenTransactionAlreadyExists",
            "parameters": {"datasetRid": "ri.foundry.main.dataset.0"},
            "errorInstanceId": "6f9ed2a8"
        }"#;
        let rpc: RpcError = serde_json::from_str(body).unwrap();
        assert_eq!(rpc.error_name, "OpenTransactionAlreadyExists");
        assert_eq!(
            rpc.parameters.get("datasetRid").and_then(|v| v.as_str()),
            Some("ri.foundry.main.dataset.0")
        );
        assert_eq!(rpc.error_instance_id.as_deref(), Some("6f9ed2a8"));

        let err = ClientError::Rpc(rpc);
        assert_eq!(err.rpc_name(), Some("OpenTransactionAlreadyExists"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rpc_error_optional_fields_default() {
        let rpc: RpcError = serde_json::from_str(r#"{"errorName": "BranchNotFound"}"#).unwrap();
        assert!(rpc.parameters.is_empty());
        assert!(rpc.error_instance_id.is_none());
    }

    #[test]
    fn test_retryable_classification() {
        let server = ClientError::ServerError {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server.is_retryable());

        let not_found = ClientError::NotFound("gone".to_string());
        assert!(!not_found.is_retryable());

        let not_open = ClientError::TransactionNotOpen {
            transaction_rid: "ri.foundry.main.transaction.1".to_string(),
            status: TransactionStatus::Committed,
        };
        assert!(!not_open.is_retryable());
        assert!(not_open.to_string().contains("COMMITTED"));
    }

    #[test]
    fn test_aborted_wrapper_keeps_cause() {
        let cause = ClientError::ServerError {
            status: 500,
            message: "boom".to_string(),
        };
        let err = ClientError::TransactionAborted {
            transaction_rid: "ri.foundry.main.transaction.3".to_string(),
            dataset_rid: "ri.foundry.main.dataset.0".to_string(),
            source: Box::new(cause),
        };
        let msg = err.to_string();
        assert!(msg.contains("ri.foundry.main.transaction.3"));
        assert!(msg.contains("aborted due to error"));

        let source = std::error::Error::source(&err).expect("cause attached");
        assert!(source.to_string().contains("boom"));
    }
}
