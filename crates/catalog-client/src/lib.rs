//! Atlas Data Catalog Client SDK
//!
//! A typed Rust client for the Atlas data catalog: datasets, branches,
//! transactions, and files, over the catalog's REST surfaces.
//!
//! # Features
//!
//! - **Dataset views**: resolve a dataset reference to a consistent
//!   transaction range (branch + start/end transaction)
//! - **Transactions**: open, write, then commit or abort; committing
//!   advances the dataset view (snapshot commits collapse it)
//! - **File transfer**: lazy paginated listings, streaming-free reads, and
//!   chunked uploads with server-side concatenation
//! - **Automatic retries**: exponential backoff for transient failures on
//!   idempotent requests; mutating requests are sent exactly once
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use atlas_catalog_client::{ClientConfig, DatasetsClient, TransactionType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DatasetsClient::new(
//!         ClientConfig::builder("https://atlas.example.com/api")
//!             .token("at_your_token")
//!             .build()?,
//!     )?;
//!
//!     // Resolve a dataset by rid or catalog path
//!     let dataset = client.dataset("ri.foundry.main.dataset.0").await?;
//!
//!     // Write a file in a transaction scope; commits on success,
//!     // aborts (and reports the cause) on failure
//!     dataset
//!         .with_transaction(TransactionType::Update, |txn| {
//!             Box::pin(async move { txn.write("data.csv", "a,b\n1,2\n".into()).await })
//!         })
//!         .await?;
//!
//!     // The dataset view now includes the committed transaction
//!     let mut files = dataset.list_files();
//!     while let Some(file) = files.try_next().await? {
//!         println!("{} ({} bytes)", file.path(), file.length().unwrap_or(0));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # View Semantics
//!
//! A dataset is bound to a view: `(start_transaction, end_transaction)` on a
//! branch. Committing a transaction updates the view atomically:
//!
//! - `Snapshot` commits collapse the view to exactly that transaction
//! - `Update`/`Append`/`Delete` commits advance only the end
//! - Aborted transactions leave the view untouched
//!
//! A branch that has never had a committed transaction resolves to an empty
//! view — listings are empty and no remote calls are made.
//!
//! # Error Handling
//!
//! All operations return `Result<T, ClientError>`. Structured remote errors
//! (`Rpc`) carry the server's error name, parameters, and instance id
//! unmodified and are never retried. Polling loops surface terminal task
//! failures (`ConcatenationFailed`, `QueryFailed`) with the server-supplied
//! message; non-terminal statuses are never errors.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
mod http;
pub mod paging;
pub mod rid;
pub mod rpc;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use client::{DatasetOptions, DatasetsClient, DEFAULT_BRANCH};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use dataset::{Dataset, File, Transaction};
pub use error::{ClientError, Result, RpcError};
pub use paging::{FileListing, ListFilesOptions};
pub use rid::ResourceIdentifier;
pub use rpc::data_proxy::ConcatenationTaskStatus;
pub use rpc::sql::QueryStatus;
pub use schema::{
    DatasetSchema, Field, FieldType, FileFormat, VersionedDatasetSchema,
};
pub use types::{DatasetLocator, FileLocator, TransactionStatus, TransactionType};
