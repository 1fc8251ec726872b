//! Dataset, transaction, and file domain objects.
//!
//! A `Dataset` owns the only mutable piece of state in the SDK: its view
//! locator, held in a shared cell so that transactions created from the
//! dataset update the same view the dataset reads. The cell is replaced
//! wholesale on every view change; a reader can never observe a torn
//! `(start, end)` pair. Locks are never held across awaits.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::client::DatasetsClient;
use crate::error::{ClientError, Result};
use crate::paging::{FileListing, ListFilesOptions};
use crate::rid::ResourceIdentifier;
use crate::rpc::catalog::FileEntry;
use crate::schema::{DatasetSchema, VersionedDatasetSchema};
use crate::types::{DatasetLocator, FileLocator, TransactionStatus, TransactionType};

/// A reference to a dataset, resolved to a branch and view (transaction
/// range).
///
/// Cloning is cheap and clones share the view: a `File` or `Transaction`
/// handed out by this dataset observes every view change the dataset makes.
#[derive(Clone)]
pub struct Dataset {
    client: DatasetsClient,
    locator: Arc<RwLock<DatasetLocator>>,
}

impl Dataset {
    pub(crate) fn new(client: DatasetsClient, locator: DatasetLocator) -> Self {
        Self {
            client,
            locator: Arc::new(RwLock::new(locator)),
        }
    }

    /// The globally unique resource identifier of the dataset.
    pub fn rid(&self) -> ResourceIdentifier {
        self.read_locator().rid.clone()
    }

    /// The branch id used for read/write operations.
    pub fn branch(&self) -> String {
        self.read_locator().branch_id.clone()
    }

    /// The view (transaction range) this dataset is bound to.
    pub fn view(&self) -> (Option<ResourceIdentifier>, Option<ResourceIdentifier>) {
        let locator = self.read_locator();
        (
            locator.start_transaction_rid.clone(),
            locator.end_transaction_rid.clone(),
        )
    }

    /// A snapshot of the current locator.
    pub fn locator(&self) -> DatasetLocator {
        self.read_locator().clone()
    }

    pub(crate) fn client(&self) -> &DatasetsClient {
        &self.client
    }

    fn read_locator(&self) -> std::sync::RwLockReadGuard<'_, DatasetLocator> {
        self.locator.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new transaction on the dataset's branch.
    ///
    /// The remote default transaction type is `Append`; any other type costs
    /// a second set-transaction-type round trip. The two steps are not
    /// atomic: if the second fails, an open `Append` transaction is left on
    /// the branch and must be aborted (or accepted) explicitly.
    pub async fn start_transaction(&self, txn_type: TransactionType) -> Result<Transaction> {
        let (rid, branch) = {
            let locator = self.read_locator();
            (locator.rid.clone(), locator.branch_id.clone())
        };
        let response = self.client.open_transaction(&rid, &branch, txn_type).await?;
        Ok(Transaction {
            client: self.client.clone(),
            dataset_rid: rid,
            locator: Arc::clone(&self.locator),
            rid: ResourceIdentifier::parse(&response.rid)?,
            status: response.status,
            txn_type: response.txn_type,
        })
    }

    /// Run `body` inside a transaction scope: committed when the body
    /// returns `Ok`, aborted when it returns `Err`.
    ///
    /// On abort the surfaced failure is
    /// [`ClientError::TransactionAborted`] wrapping the body's error as its
    /// cause, so the original failure is never swallowed. A failure of the
    /// abort call itself is logged and does not mask the original error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use atlas_catalog_client::TransactionType;
    /// # async fn demo(dataset: atlas_catalog_client::Dataset) -> atlas_catalog_client::Result<()> {
    /// dataset
    ///     .with_transaction(TransactionType::Update, |txn| {
    ///         Box::pin(async move { txn.write("report.csv", "a,b\n1,2\n".into()).await })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_transaction<T, F>(&self, txn_type: TransactionType, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut txn = self.start_transaction(txn_type).await?;
        match body(&txn).await {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(cause) => {
                let transaction_rid = txn.rid().to_string();
                let dataset_rid = txn.dataset_rid.to_string();
                if let Err(abort_error) = txn.abort().await {
                    tracing::warn!(
                        transaction_rid = %transaction_rid,
                        error = %abort_error,
                        "failed to abort transaction after error"
                    );
                }
                Err(ClientError::TransactionAborted {
                    transaction_rid,
                    dataset_rid,
                    source: Box::new(cause),
                })
            }
        }
    }

    /// List the files in the dataset's current view.
    pub fn list_files(&self) -> FileListing {
        self.list_files_with(ListFilesOptions::default())
    }

    /// List files with an explicit path prefix, page size, or open-transaction
    /// visibility.
    pub fn list_files_with(&self, options: ListFilesOptions) -> FileListing {
        FileListing::new(self.clone(), options)
    }

    /// A handle to a file within the dataset view. The file need not exist:
    /// writing to the handle creates it in a fresh transaction.
    pub fn file(&self, path: impl Into<String>) -> File {
        File {
            dataset: self.clone(),
            path: path.into(),
            modified: None,
            transaction_rid: None,
            length: None,
        }
    }

    /// Update the dataset view: to the given range, or to the latest
    /// committed range on the branch when none is given.
    pub async fn update_view(
        &self,
        transaction_range: Option<(ResourceIdentifier, ResourceIdentifier)>,
    ) -> Result<()> {
        let (rid, branch) = {
            let locator = self.read_locator();
            (locator.rid.clone(), locator.branch_id.clone())
        };
        let (start, end) = match transaction_range {
            Some((start, end)) => (Some(start), Some(end)),
            None => self.client.get_transaction_range(&rid, &branch, false).await?,
        };
        let mut guard = self.locator.write().unwrap_or_else(PoisonError::into_inner);
        let updated = guard.with_updated(start, end);
        *guard = updated;
        Ok(())
    }

    /// Put a schema on the dataset's branch at the current view.
    pub async fn put_schema(&self, schema: &DatasetSchema) -> Result<()> {
        self.client.put_schema(&self.locator(), schema).await
    }

    /// The schema at the current view, or `None` when no schema was put.
    pub async fn get_schema(&self) -> Result<Option<VersionedDatasetSchema>> {
        self.client.get_schema(&self.locator()).await
    }

    /// The full content of the view as a raw Arrow-framed byte stream. The
    /// dataset must have a schema and be tabular.
    pub async fn read_raw(&self) -> Result<Bytes> {
        self.client.read_raw(&self.locator()).await
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locator = self.read_locator();
        write!(
            f,
            "Dataset(rid=\"{}\", branch=\"{}\")",
            locator.rid, locator.branch_id
        )
    }
}

/// An open transaction on a dataset branch.
///
/// `Open → Committed` or `Open → Aborted`, terminal once reached; any
/// further commit/abort/write is a [`ClientError::TransactionNotOpen`]
/// caller bug. Committing updates the owning dataset's view; aborting
/// leaves it untouched.
pub struct Transaction {
    client: DatasetsClient,
    dataset_rid: ResourceIdentifier,
    locator: Arc<RwLock<DatasetLocator>>,
    rid: ResourceIdentifier,
    status: TransactionStatus,
    txn_type: TransactionType,
}

impl Transaction {
    /// The transaction's resource identifier.
    pub fn rid(&self) -> &ResourceIdentifier {
        &self.rid
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn txn_type(&self) -> TransactionType {
        self.txn_type
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status != TransactionStatus::Open {
            return Err(ClientError::TransactionNotOpen {
                transaction_rid: self.rid.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Write content to a file within this transaction.
    pub async fn write(&self, path: &str, content: Bytes) -> Result<()> {
        self.ensure_open()?;
        let locator = FileLocator::new(self.dataset_rid.clone(), self.rid.to_string(), path);
        self.client.put_file(&locator, content).await
    }

    /// Commit the open transaction and advance the owning dataset's view.
    ///
    /// A `Snapshot` commit discards history: the view collapses to exactly
    /// this transaction. Any other type extends the view: the end advances
    /// to this transaction and the start is preserved.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.client
            .commit_transaction(&self.dataset_rid, &self.rid)
            .await?;
        self.status = TransactionStatus::Committed;

        let mut guard = self.locator.write().unwrap_or_else(PoisonError::into_inner);
        let updated = if self.txn_type == TransactionType::Snapshot {
            guard.with_updated(Some(self.rid.clone()), Some(self.rid.clone()))
        } else {
            guard.with_updated(None, Some(self.rid.clone()))
        };
        *guard = updated;
        Ok(())
    }

    /// Abort the open transaction. The dataset's view is not touched;
    /// aborted work is invisible.
    pub async fn abort(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.client
            .abort_transaction(&self.dataset_rid, &self.rid)
            .await?;
        self.status = TransactionStatus::Aborted;
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction(rid=\"{}\", dataset_rid=\"{}\", type={}, status={})",
            self.rid, self.dataset_rid, self.txn_type, self.status
        )
    }
}

/// A file within a dataset view: a read-only metadata snapshot plus read and
/// write operations. Writing never mutates this object — it creates a new
/// transaction on the owning dataset.
#[derive(Clone)]
pub struct File {
    dataset: Dataset,
    path: String,
    modified: Option<DateTime<Utc>>,
    transaction_rid: Option<ResourceIdentifier>,
    length: Option<u64>,
}

impl File {
    pub(crate) fn from_entry(dataset: Dataset, entry: FileEntry) -> Result<Self> {
        Ok(Self {
            path: entry.logical_path,
            modified: entry.time_modified,
            transaction_rid: entry
                .transaction_rid
                .as_deref()
                .map(ResourceIdentifier::parse)
                .transpose()?,
            length: entry.file_metadata.map(|m| m.length),
            dataset,
        })
    }

    /// The logical path of the file within the dataset.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// When the file was last modified, if known.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// The transaction that produced this file version, when the file came
    /// from a listing.
    pub fn transaction_rid(&self) -> Option<&ResourceIdentifier> {
        self.transaction_rid.as_ref()
    }

    /// The file length in bytes, if known.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// The locator pinning this file: resolved from its producing
    /// transaction when known, from the dataset's branch otherwise.
    pub fn locator(&self) -> FileLocator {
        let end_ref = self
            .transaction_rid
            .as_ref()
            .map(|rid| rid.to_string())
            .unwrap_or_else(|| self.dataset.branch());
        FileLocator::new(self.dataset.rid(), end_ref, self.path.clone())
    }

    /// The file content.
    pub async fn read(&self) -> Result<Bytes> {
        self.dataset.client().read_file(&self.locator()).await
    }

    /// Write content to the file in a new transaction of the given type,
    /// committing on success (and advancing the parent dataset's view) or
    /// aborting on failure.
    pub async fn write(&self, content: Bytes, txn_type: TransactionType) -> Result<()> {
        let locator = self.locator();
        let client = self.dataset.client().clone();
        self.dataset
            .with_transaction(txn_type, move |txn| {
                let locator = locator.with_end_ref(txn.rid().to_string());
                Box::pin(async move { client.put_file(&locator, content).await })
            })
            .await
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File(dataset_rid=\"{}\", path=\"{}\")",
            self.dataset.rid(),
            self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn rid(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    fn test_dataset(locator: DatasetLocator) -> Dataset {
        let client = DatasetsClient::new(ClientConfig::default()).unwrap();
        Dataset::new(client, locator)
    }

    #[test]
    fn test_view_accessors() {
        let dataset = test_dataset(DatasetLocator {
            rid: rid("ri.foundry.test.dataset.0"),
            branch_id: "master".to_string(),
            start_transaction_rid: Some(rid("ri.foundry.test.transaction.0")),
            end_transaction_rid: Some(rid("ri.foundry.test.transaction.1")),
        });
        assert_eq!(dataset.rid(), rid("ri.foundry.test.dataset.0"));
        assert_eq!(dataset.branch(), "master");
        assert_eq!(
            dataset.view(),
            (
                Some(rid("ri.foundry.test.transaction.0")),
                Some(rid("ri.foundry.test.transaction.1"))
            )
        );
    }

    #[test]
    fn test_clones_share_the_view() {
        let dataset = test_dataset(DatasetLocator::new(rid("ri.foundry.test.dataset.0"), "master"));
        let clone = dataset.clone();

        let mut guard = dataset.locator.write().unwrap();
        let updated = guard.with_updated(None, Some(rid("ri.foundry.test.transaction.5")));
        *guard = updated;
        drop(guard);

        assert_eq!(
            clone.view().1,
            Some(rid("ri.foundry.test.transaction.5"))
        );
    }

    #[test]
    fn test_file_locator_prefers_producing_transaction() {
        let dataset = test_dataset(DatasetLocator::new(rid("ri.foundry.test.dataset.0"), "develop"));

        let unpinned = dataset.file("raw/data.csv");
        assert_eq!(unpinned.locator().end_ref, "develop");

        let pinned = File {
            transaction_rid: Some(rid("ri.foundry.test.transaction.7")),
            ..unpinned
        };
        assert_eq!(pinned.locator().end_ref, "ri.foundry.test.transaction.7");
        assert_eq!(pinned.locator().logical_path, "raw/data.csv");
    }

    #[test]
    fn test_debug_formats() {
        let dataset = test_dataset(DatasetLocator::new(rid("ri.foundry.test.dataset.0"), "master"));
        assert_eq!(
            format!("{dataset:?}"),
            "Dataset(rid=\"ri.foundry.test.dataset.0\", branch=\"master\")"
        );
        let file = dataset.file("a.txt");
        assert!(format!("{file:?}").contains("a.txt"));
    }
}
