//! Lazy pagination over view file listings.

use std::collections::VecDeque;

use futures::stream::Stream;

use crate::dataset::{Dataset, File};
use crate::error::Result;
use crate::types::DatasetLocator;

/// Options for a file listing.
#[derive(Debug, Clone)]
pub struct ListFilesOptions {
    /// Only list files under this logical path prefix.
    pub path_prefix: Option<String>,
    /// Also expose files modified by the currently-open (uncommitted)
    /// transaction on the branch.
    pub include_open_transaction: bool,
    /// Page size for the underlying listing requests.
    pub page_size: u32,
}

impl Default for ListFilesOptions {
    fn default() -> Self {
        Self {
            path_prefix: None,
            include_open_transaction: false,
            page_size: 100,
        }
    }
}

/// A lazy, non-restartable walk over the files in a dataset view.
///
/// Pages are fetched on demand as the consumer advances; the page token of
/// request N+1 is exactly the token returned by response N, and iteration
/// stops when a response carries no token. The view parameters are snapshot
/// at construction — build a new listing to traverse again (a fresh walk,
/// not a resumption). A view with no end transaction yields an empty
/// listing without any remote call.
pub struct FileListing {
    dataset: Dataset,
    view: DatasetLocator,
    options: ListFilesOptions,
    buffer: VecDeque<File>,
    next_token: Option<String>,
    exhausted: bool,
}

impl FileListing {
    pub(crate) fn new(dataset: Dataset, options: ListFilesOptions) -> Self {
        let view = dataset.locator();
        let exhausted = view.end_transaction_rid.is_none();
        Self {
            dataset,
            view,
            options,
            buffer: VecDeque::new(),
            next_token: None,
            exhausted,
        }
    }

    /// The next file, fetching a page when the buffer runs dry. The first
    /// error encountered ends the iteration.
    pub async fn try_next(&mut self) -> Result<Option<File>> {
        loop {
            if let Some(file) = self.buffer.pop_front() {
                return Ok(Some(file));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .dataset
                .client()
                .list_view_files_page(
                    &self.view,
                    self.options.path_prefix.as_deref(),
                    self.options.include_open_transaction,
                    self.options.page_size,
                    self.next_token.as_deref(),
                )
                .await?;
            self.next_token = page.next_page_token;
            self.exhausted = self.next_token.is_none();
            for entry in page.values {
                self.buffer
                    .push_back(File::from_entry(self.dataset.clone(), entry)?);
            }
        }
    }

    /// Drain the listing into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<File>> {
        let mut files = Vec::new();
        while let Some(file) = self.try_next().await? {
            files.push(file);
        }
        Ok(files)
    }

    /// Adapt the listing into a `futures` stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<File>> {
        futures::stream::try_unfold(self, |mut listing| async move {
            let next = listing.try_next().await?;
            Ok(next.map(|file| (file, listing)))
        })
    }
}
