//! The typed client facade over the rpc surfaces.
//!
//! `DatasetsClient` is cheap to clone (the transport is shared) and is the
//! only way to construct `Dataset`/`Transaction`/`File` values — there is no
//! ambient default client.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::dataset::Dataset;
use crate::error::{ClientError, Result};
use crate::http::Transport;
use crate::rid::ResourceIdentifier;
use crate::rpc::data_proxy::{ConcatenationTaskStatus, StartConcatenationTaskRequest};
use crate::rpc::sql::{QueryStatus, SerializationProtocol, SqlDialect, SqlExecuteRequest};
use crate::rpc::{catalog, data_proxy, path, schema as schema_rpc, sql};
use crate::schema::{DatasetSchema, VersionedDatasetSchema};
use crate::types::{normalize_logical_path, DatasetLocator, FileLocator, TransactionType};

/// Branch used when the caller does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Options for [`DatasetsClient::dataset_with`].
#[derive(Debug, Clone, Default)]
pub struct DatasetOptions {
    /// Branch to bind to. Defaults to [`DEFAULT_BRANCH`].
    pub branch: Option<String>,
    /// Pin the view to a fixed transaction range instead of resolving the
    /// latest one.
    pub transaction_range: Option<(ResourceIdentifier, ResourceIdentifier)>,
    /// Create the dataset (and branch) when the reference does not resolve.
    pub create: bool,
}

/// Typed client for the Atlas catalog, data-proxy, schema, and SQL surfaces.
#[derive(Clone)]
pub struct DatasetsClient {
    transport: Arc<Transport>,
}

impl DatasetsClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(Transport::new(config)?),
        })
    }

    /// Create a new configuration builder with the given base URL.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    // =========================================================================
    // Dataset resolution
    // =========================================================================

    /// Resolve a dataset reference (rid or catalog path) on the default
    /// branch, bound to the latest committed transaction range.
    pub async fn dataset(&self, dataset_ref: &str) -> Result<Dataset> {
        self.dataset_with(dataset_ref, DatasetOptions::default())
            .await
    }

    /// Resolve a dataset reference with explicit options.
    pub async fn dataset_with(&self, dataset_ref: &str, options: DatasetOptions) -> Result<Dataset> {
        let branch = options
            .branch
            .clone()
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let rid = match self.resolve_dataset_rid(dataset_ref).await? {
            Some(rid) => rid,
            None if options.create => return self.create_dataset(dataset_ref, &branch).await,
            None => {
                return Err(ClientError::NotFound(format!(
                    "could not resolve dataset_ref '{dataset_ref}'"
                )))
            }
        };

        let (start, end) = match options.transaction_range {
            Some((start, end)) => (Some(start), Some(end)),
            None => self.get_transaction_range(&rid, &branch, false).await?,
        };

        Ok(Dataset::new(
            self.clone(),
            DatasetLocator {
                rid,
                branch_id: branch,
                start_transaction_rid: start,
                end_transaction_rid: end,
            },
        ))
    }

    /// Resolve a dataset reference to its rid, or `None` when the reference
    /// is a path with nothing behind it.
    pub async fn resolve_dataset_rid(
        &self,
        dataset_ref: &str,
    ) -> Result<Option<ResourceIdentifier>> {
        if let Some(rid) = ResourceIdentifier::try_parse(dataset_ref) {
            if rid.is_dataset() {
                return Ok(Some(rid));
            }
            return Err(ClientError::NotADataset(rid.to_string()));
        }

        match path::get_resource_by_path(&self.transport, dataset_ref).await? {
            Some(resource) => Ok(Some(ResourceIdentifier::parse(&resource.rid)?)),
            None => Ok(None),
        }
    }

    /// Create a dataset at the given path with the given branch. The
    /// returned dataset has an unborn view (no committed transactions).
    pub async fn create_dataset(&self, path: &str, branch: &str) -> Result<Dataset> {
        let created = catalog::create_dataset(&self.transport, path).await?;
        catalog::create_branch(&self.transport, &created.rid, branch).await?;
        let rid = ResourceIdentifier::parse(&created.rid)?;
        Ok(Dataset::new(self.clone(), DatasetLocator::new(rid, branch)))
    }

    // =========================================================================
    // View resolution
    // =========================================================================

    /// Resolve the current transaction range of a branch.
    ///
    /// Returns `(None, None)` when the branch exists but has never had a
    /// committed transaction — a valid empty-dataset state, distinct from
    /// "branch does not exist" (a remote error). With
    /// `include_open_transaction`, the range also covers files modified by
    /// the currently-open transaction on the branch, so a writer can see its
    /// own uncommitted data.
    pub async fn get_transaction_range(
        &self,
        dataset_rid: &ResourceIdentifier,
        branch_id: &str,
        include_open_transaction: bool,
    ) -> Result<(Option<ResourceIdentifier>, Option<ResourceIdentifier>)> {
        let range = catalog::get_view_range(
            &self.transport,
            &dataset_rid.to_string(),
            branch_id,
            include_open_transaction,
        )
        .await?;
        match range {
            Some(range) => Ok((
                Some(ResourceIdentifier::parse(&range.start_transaction_rid)?),
                Some(ResourceIdentifier::parse(&range.end_transaction_rid)?),
            )),
            None => Ok((None, None)),
        }
    }

    // =========================================================================
    // Transactions (called through Dataset/Transaction)
    // =========================================================================

    /// Open a transaction on a branch. When the requested type is not
    /// `Append` (the remote default), a second set-transaction-type call is
    /// issued: this is a two-step protocol, and a failure between the steps
    /// leaves an open APPEND transaction on the branch.
    pub(crate) async fn open_transaction(
        &self,
        dataset_rid: &ResourceIdentifier,
        branch_id: &str,
        txn_type: TransactionType,
    ) -> Result<catalog::TransactionResponse> {
        let dataset_rid = dataset_rid.to_string();
        let mut txn = catalog::start_transaction(&self.transport, &dataset_rid, branch_id).await?;
        if txn_type != TransactionType::Append {
            txn =
                catalog::set_transaction_type(&self.transport, &dataset_rid, &txn.rid, txn_type)
                    .await?;
        }
        Ok(txn)
    }

    pub(crate) async fn commit_transaction(
        &self,
        dataset_rid: &ResourceIdentifier,
        transaction_rid: &ResourceIdentifier,
    ) -> Result<()> {
        catalog::commit_transaction(
            &self.transport,
            &dataset_rid.to_string(),
            &transaction_rid.to_string(),
        )
        .await
    }

    pub(crate) async fn abort_transaction(
        &self,
        dataset_rid: &ResourceIdentifier,
        transaction_rid: &ResourceIdentifier,
    ) -> Result<()> {
        catalog::abort_transaction(
            &self.transport,
            &dataset_rid.to_string(),
            &transaction_rid.to_string(),
        )
        .await
    }

    // =========================================================================
    // Files
    // =========================================================================

    pub(crate) async fn list_view_files_page(
        &self,
        locator: &DatasetLocator,
        path_prefix: Option<&str>,
        include_open_transaction: bool,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<catalog::ListFilesPage> {
        let start = locator
            .start_transaction_rid
            .as_ref()
            .map(|rid| rid.to_string());
        let normalized = path_prefix.map(normalize_logical_path);
        catalog::get_view_files(
            &self.transport,
            &locator.rid.to_string(),
            start.as_deref(),
            &locator.end_ref(),
            normalized.as_deref(),
            include_open_transaction,
            page_size,
            page_token,
        )
        .await
    }

    /// Fetch the content of a file resolved within a view.
    pub async fn read_file(&self, locator: &FileLocator) -> Result<Bytes> {
        data_proxy::get_file_in_view(
            &self.transport,
            &locator.dataset_rid.to_string(),
            &locator.end_ref,
            &normalize_logical_path(&locator.logical_path),
            locator.start_transaction_rid.as_deref(),
        )
        .await
    }

    /// Upload file content into an open transaction (`locator.end_ref` must
    /// be the transaction rid).
    ///
    /// Content below the configured chunk size is uploaded directly. Larger
    /// content is split into fixed-size chunks uploaded one at a time to
    /// `<path>.<index>`, then concatenated server-side; this call returns
    /// only once the concatenation task reports a terminal status.
    pub async fn put_file(&self, locator: &FileLocator, content: Bytes) -> Result<()> {
        let chunk_size = self.config().upload_chunk_size;
        let logical_path = normalize_logical_path(&locator.logical_path);
        if content.len() < chunk_size {
            return data_proxy::put_file(
                &self.transport,
                &locator.dataset_rid.to_string(),
                &locator.end_ref,
                &logical_path,
                content,
            )
            .await;
        }
        self.put_file_chunked(locator, &logical_path, content, chunk_size)
            .await
    }

    async fn put_file_chunked(
        &self,
        locator: &FileLocator,
        logical_path: &str,
        content: Bytes,
        chunk_size: usize,
    ) -> Result<()> {
        let dataset_rid = locator.dataset_rid.to_string();

        let mut chunk_paths = Vec::new();
        for (index, (offset, end)) in chunk_spans(content.len(), chunk_size).enumerate() {
            let chunk_path = format!("{logical_path}.{index}");
            data_proxy::put_file(
                &self.transport,
                &dataset_rid,
                &locator.end_ref,
                &chunk_path,
                content.slice(offset..end),
            )
            .await?;
            chunk_paths.push(chunk_path);
        }

        tracing::debug!(
            path = %logical_path,
            chunks = chunk_paths.len(),
            "starting concatenation task"
        );

        let started = data_proxy::start_concatenation_task(
            &self.transport,
            &dataset_rid,
            &locator.end_ref,
            &StartConcatenationTaskRequest {
                destination_path: logical_path.to_string(),
                source_paths: chunk_paths,
            },
        )
        .await?;

        self.await_concatenation(&started.concatenation_task_id)
            .await
    }

    /// Poll a concatenation task at a fixed interval until terminal.
    async fn await_concatenation(&self, task_id: &str) -> Result<()> {
        let interval = self.config().concat_poll_interval;
        let max_attempts = self.config().max_poll_attempts;
        let mut attempts: u32 = 0;
        loop {
            let report =
                data_proxy::get_concatenation_task_status(&self.transport, task_id).await?;
            match report.status {
                ConcatenationTaskStatus::Success => return Ok(()),
                ConcatenationTaskStatus::Failure { error_message, .. } => {
                    return Err(ClientError::ConcatenationFailed {
                        message: error_message,
                    })
                }
                ConcatenationTaskStatus::Queued => {}
                ConcatenationTaskStatus::InProgress {
                    concatenated_files_count,
                    total_files_count,
                    ..
                } => {
                    tracing::debug!(
                        task_id = %task_id,
                        concatenated = concatenated_files_count,
                        total = total_files_count,
                        "concatenation in progress"
                    );
                }
            }
            attempts += 1;
            if let Some(max) = max_attempts {
                if attempts >= max {
                    return Err(ClientError::PollLimitExceeded { attempts });
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Put a schema on the view's branch, pinned to its end transaction.
    pub async fn put_schema(&self, locator: &DatasetLocator, schema: &DatasetSchema) -> Result<()> {
        let end = locator
            .end_transaction_rid
            .as_ref()
            .map(|rid| rid.to_string());
        schema_rpc::put_schema(
            &self.transport,
            &locator.rid.to_string(),
            &locator.branch_id,
            end.as_deref(),
            &schema.to_wire(),
        )
        .await
    }

    /// Fetch the schema at a view, or `None` when no schema has been put.
    pub async fn get_schema(&self, locator: &DatasetLocator) -> Result<Option<VersionedDatasetSchema>> {
        let end = locator
            .end_transaction_rid
            .as_ref()
            .map(|rid| rid.to_string());
        let versioned = schema_rpc::get_schema(
            &self.transport,
            &locator.rid.to_string(),
            &locator.branch_id,
            end.as_deref(),
            None,
        )
        .await?;
        match versioned {
            None => Ok(None),
            Some(wire) => Ok(Some(VersionedDatasetSchema {
                transaction_rid: wire
                    .transaction_rid
                    .as_deref()
                    .map(ResourceIdentifier::parse)
                    .transpose()?,
                branch_id: wire.branch_id,
                version_id: wire.version_id,
                schema: DatasetSchema::from_wire(&wire.schema)?,
            })),
        }
    }

    // =========================================================================
    // SQL read path
    // =========================================================================

    /// Read the full content of a view as a raw Arrow-framed byte stream.
    ///
    /// Submits a `SELECT *` query pinned to the view's end transaction and
    /// branch, polls the query status at a fixed interval until terminal,
    /// then fetches the results. The payload is returned opaquely; this
    /// client does not decode the Arrow framing.
    pub async fn read_raw(&self, locator: &DatasetLocator) -> Result<Bytes> {
        let end = locator
            .end_transaction_rid
            .as_ref()
            .ok_or_else(|| ClientError::UnresolvedView(locator.rid.to_string()))?;

        let query = format!(
            "SELECT * FROM \"{}@{}\".\"{}\"",
            end, locator.branch_id, locator.rid
        );
        let response = sql::execute(
            &self.transport,
            &SqlExecuteRequest {
                query,
                dialect: SqlDialect::Ansi,
                serialization_protocol: SerializationProtocol::Arrow,
                fallback_branch_ids: vec![],
                timeout: None,
            },
        )
        .await?;

        let interval = self.config().query_poll_interval;
        let max_attempts = self.config().max_poll_attempts;
        let mut attempts: u32 = 0;
        let mut status = response.status;
        loop {
            match status {
                QueryStatus::Ready | QueryStatus::Canceled => break,
                QueryStatus::Failed {
                    error_message,
                    failure_reason,
                } => {
                    return Err(ClientError::QueryFailed {
                        reason: failure_reason,
                        message: error_message.unwrap_or_default(),
                    })
                }
                QueryStatus::Running => {}
            }
            attempts += 1;
            if let Some(max) = max_attempts {
                if attempts >= max {
                    return Err(ClientError::PollLimitExceeded { attempts });
                }
            }
            tokio::time::sleep(interval).await;
            status = sql::get_status(&self.transport, &response.query_id)
                .await?
                .status;
        }

        let stream = sql::get_results(&self.transport, &response.query_id).await?;
        // the first byte is a control character; 'A' introduces Arrow framing
        match stream.first() {
            Some(b'A') => Ok(stream.slice(1..)),
            other => Err(ClientError::InvalidResponse(format!(
                "unexpected control byte in query results: {other:?}"
            ))),
        }
    }
}

/// Byte ranges covering `0..len` in `chunk_size` steps; the last span may be
/// shorter.
fn chunk_spans(len: usize, chunk_size: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len)
        .step_by(chunk_size)
        .map(move |offset| (offset, usize::min(offset + chunk_size, len)))
}
