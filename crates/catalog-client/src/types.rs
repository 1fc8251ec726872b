//! Core value types: dataset/file locators and transaction enums.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rid::ResourceIdentifier;

/// A pinned view of a dataset: a branch plus a resolved transaction range.
///
/// Immutable. View changes replace the whole locator via
/// [`with_updated`](Self::with_updated) rather than mutating in place, so a
/// reader can never observe a torn `(start, end)` pair. Absent `start`/`end`
/// means the branch has no committed data yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLocator {
    pub rid: ResourceIdentifier,
    pub branch_id: String,
    pub start_transaction_rid: Option<ResourceIdentifier>,
    pub end_transaction_rid: Option<ResourceIdentifier>,
}

impl DatasetLocator {
    pub fn new(rid: ResourceIdentifier, branch_id: impl Into<String>) -> Self {
        Self {
            rid,
            branch_id: branch_id.into(),
            start_transaction_rid: None,
            end_transaction_rid: None,
        }
    }

    /// Returns a new locator with the given fields overridden; unspecified
    /// (`None`) fields keep their previous value.
    pub fn with_updated(
        &self,
        start_transaction_rid: Option<ResourceIdentifier>,
        end_transaction_rid: Option<ResourceIdentifier>,
    ) -> Self {
        Self {
            rid: self.rid.clone(),
            branch_id: self.branch_id.clone(),
            start_transaction_rid: start_transaction_rid
                .or_else(|| self.start_transaction_rid.clone()),
            end_transaction_rid: end_transaction_rid.or_else(|| self.end_transaction_rid.clone()),
        }
    }

    /// The reference to resolve reads against: the end transaction when the
    /// view has one, the branch id otherwise.
    pub fn end_ref(&self) -> String {
        self.end_transaction_rid
            .as_ref()
            .map(|rid| rid.to_string())
            .unwrap_or_else(|| self.branch_id.clone())
    }
}

/// Pins a file to a dataset and a resolution point.
///
/// `end_ref` is either a transaction rid or a branch id — whichever
/// identifies where the file should be resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocator {
    pub dataset_rid: ResourceIdentifier,
    pub end_ref: String,
    pub logical_path: String,
    pub start_transaction_rid: Option<String>,
}

impl FileLocator {
    pub fn new(
        dataset_rid: ResourceIdentifier,
        end_ref: impl Into<String>,
        logical_path: impl Into<String>,
    ) -> Self {
        Self {
            dataset_rid,
            end_ref: end_ref.into(),
            logical_path: logical_path.into(),
            start_transaction_rid: None,
        }
    }

    /// Returns a new locator resolving from a different end reference.
    pub fn with_end_ref(&self, end_ref: impl Into<String>) -> Self {
        Self {
            end_ref: end_ref.into(),
            ..self.clone()
        }
    }
}

/// How a transaction changes the files in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Update,
    Append,
    Delete,
    Snapshot,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Update => "UPDATE",
            TransactionType::Append => "APPEND",
            TransactionType::Delete => "DELETE",
            TransactionType::Snapshot => "SNAPSHOT",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a transaction. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Open,
    Committed,
    Aborted,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Open)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Open => "OPEN",
            TransactionStatus::Committed => "COMMITTED",
            TransactionStatus::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Normalizes a logical path for use in requests: strips any leading `/` or
/// `./` so that absolute-looking inputs address the same dataset-relative
/// file as their relative spelling.
pub(crate) fn normalize_logical_path(path: &str) -> String {
    let mut rest = path;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_with_updated_keeps_unspecified_fields() {
        let locator = DatasetLocator {
            rid: rid("ri.foundry.test.dataset.0"),
            branch_id: "master".to_string(),
            start_transaction_rid: Some(rid("ri.foundry.test.transaction.0")),
            end_transaction_rid: Some(rid("ri.foundry.test.transaction.1")),
        };

        let updated = locator.with_updated(None, Some(rid("ri.foundry.test.transaction.2")));
        assert_eq!(
            updated.start_transaction_rid,
            Some(rid("ri.foundry.test.transaction.0"))
        );
        assert_eq!(
            updated.end_transaction_rid,
            Some(rid("ri.foundry.test.transaction.2"))
        );
        assert_eq!(updated.rid, locator.rid);
        assert_eq!(updated.branch_id, "master");
        // the original is untouched
        assert_eq!(
            locator.end_transaction_rid,
            Some(rid("ri.foundry.test.transaction.1"))
        );
    }

    #[test]
    fn test_end_ref_prefers_end_transaction() {
        let mut locator = DatasetLocator::new(rid("ri.foundry.test.dataset.0"), "develop");
        assert_eq!(locator.end_ref(), "develop");

        locator.end_transaction_rid = Some(rid("ri.foundry.test.transaction.9"));
        assert_eq!(locator.end_ref(), "ri.foundry.test.transaction.9");
    }

    #[test]
    fn test_transaction_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Snapshot).unwrap(),
            "\"SNAPSHOT\""
        );
        let parsed: TransactionType = serde_json::from_str("\"APPEND\"").unwrap();
        assert_eq!(parsed, TransactionType::Append);
        assert_eq!(TransactionType::Update.to_string(), "UPDATE");
    }

    #[test]
    fn test_transaction_status_terminal() {
        assert!(!TransactionStatus::Open.is_terminal());
        assert!(TransactionStatus::Committed.is_terminal());
        assert!(TransactionStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_normalize_logical_path() {
        assert_eq!(normalize_logical_path("a/b.txt"), "a/b.txt");
        assert_eq!(normalize_logical_path("/a/b.txt"), "a/b.txt");
        assert_eq!(normalize_logical_path("./a/b.txt"), "a/b.txt");
        assert_eq!(normalize_logical_path(".//a"), "a");
    }
}
