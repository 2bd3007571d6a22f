//! Bulk acquisition of items from a JSON item API into the corpus CSV layout.

use std::fs::{self, File};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::corpus::CORPUS_COLUMNS;

/// Public Hacker News item API root.
pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Errors raised while fetching or writing items.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("a fetch worker panicked")]
    WorkerPanicked,
}

/// Item fields kept in the corpus. Other JSON fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub by: Option<String>,
    pub id: Option<u64>,
    pub score: Option<i64>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub time: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Outcome counts of a range fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub requested: usize,
    pub fetched: usize,
    /// Ids for which the API answered `null`.
    pub missing: usize,
    /// Ids whose request failed; logged and skipped.
    pub failed: usize,
}

/// Ids `[max_item - count, max_item)`, clamped at zero.
pub fn id_range(max_item: u64, count: u64) -> Range<u64> {
    max_item.saturating_sub(count)..max_item
}

/// Blocking client for the item API.
#[derive(Clone, Debug)]
pub struct ItemClient {
    client: Client,
    base_url: String,
}

impl ItemClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Highest item id currently known to the API.
    pub fn max_item(&self) -> Result<u64, FetchError> {
        let url = format!("{}/maxitem.json", self.base_url);
        Ok(self.client.get(url).send()?.error_for_status()?.json()?)
    }

    /// Single item; `None` when the API answers `null`.
    pub fn item(&self, id: u64) -> Result<Option<Item>, FetchError> {
        let url = format!("{}/item/{id}.json", self.base_url);
        Ok(self.client.get(url).send()?.error_for_status()?.json()?)
    }

    /// Fetches every id in `ids` using up to `workers` threads and returns
    /// the items in id order.
    pub fn fetch_range(
        &self,
        ids: Range<u64>,
        workers: usize,
    ) -> Result<(Vec<Item>, FetchReport), FetchError> {
        let ids: Vec<u64> = ids.collect();
        let chunk_size = ids.len().div_ceil(workers.max(1)).max(1);
        info!(
            requested = ids.len(),
            workers = workers.max(1),
            base_url = %self.base_url,
            "fetching items"
        );

        let chunks = thread::scope(|scope| {
            let handles: Vec<_> = ids
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|&id| (id, self.item(id)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| FetchError::WorkerPanicked))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut report = FetchReport {
            requested: ids.len(),
            ..FetchReport::default()
        };
        let mut items = Vec::with_capacity(ids.len());
        for (id, outcome) in chunks.into_iter().flatten() {
            match outcome {
                Ok(Some(item)) => {
                    report.fetched += 1;
                    items.push(item);
                }
                Ok(None) => {
                    debug!(id, "item not found");
                    report.missing += 1;
                }
                Err(error) => {
                    warn!(id, %error, "item request failed, skipping");
                    report.failed += 1;
                }
            }
        }
        info!(
            fetched = report.fetched,
            missing = report.missing,
            failed = report.failed,
            "fetch finished"
        );
        Ok((items, report))
    }
}

/// Writes items as CSV with the corpus header; absent fields become empty.
pub fn write_items<W: Write>(writer: W, items: &[Item]) -> Result<(), FetchError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(CORPUS_COLUMNS)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    Ok(())
}

/// [`write_items`] into a file, creating parent directories.
pub fn write_items_to_path(path: &Path, items: &[Item]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    write_items(File::create(path)?, items)
}
