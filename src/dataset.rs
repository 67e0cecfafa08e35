use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{stream, StreamExt};
use tokio::sync::Mutex;

use crate::{
    domain::CanonicalRecord,
    error::ServiceError,
    normalize::extract_canonical,
    reader::decode_csv,
    store::BlobStore,
};

/// How long a materialized dataset stays fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// How many blobs are fetched concurrently during a refresh.
const FETCH_CONCURRENCY: usize = 8;

/// Outcome of one full-bucket refresh. Per-file failures are collected here
/// and skipped so a single corrupt historical file cannot block queries.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub listed: usize,
    pub loaded: usize,
    pub skipped: Vec<(String, String)>,
}

struct CacheSlot {
    dataset: Arc<Vec<CanonicalRecord>>,
    refreshed_at: Option<Instant>,
}

/// Materializes the consolidated dataset from the blob store with bounded
/// staleness.
///
/// All mutable state lives behind async mutexes: the slot mutex is held for
/// the whole refresh, so concurrent cache-miss callers share one in-flight
/// store scan, and the dataset is swapped as an `Arc` so readers never see a
/// partial rebuild.
pub struct DatasetCache {
    store: Arc<dyn BlobStore>,
    ttl: Duration,
    slot: Mutex<CacheSlot>,
    states: Mutex<Option<Arc<Vec<String>>>>,
}

impl DatasetCache {
    pub fn new(store: Arc<dyn BlobStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            slot: Mutex::new(CacheSlot {
                dataset: Arc::new(Vec::new()),
                refreshed_at: None,
            }),
            states: Mutex::new(None),
        }
    }

    /// Returns the consolidated dataset, refreshing from the store when the
    /// cached copy is older than the ttl. An empty or all-invalid bucket
    /// yields an empty dataset, not an error; only a failed listing is
    /// surfaced.
    pub async fn dataset(&self) -> Result<Arc<Vec<CanonicalRecord>>, ServiceError> {
        let mut slot = self.slot.lock().await;

        if let Some(refreshed_at) = slot.refreshed_at {
            if refreshed_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&slot.dataset));
            }
        }

        let (dataset, report) = self.refresh().await?;
        metrics::counter!("dataset_refresh_total").increment(1);
        if !report.skipped.is_empty() {
            metrics::counter!("dataset_files_skipped_total")
                .increment(report.skipped.len() as u64);
        }
        tracing::info!(
            listed = report.listed,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            rows = dataset.len(),
            "refreshed consolidated dataset"
        );

        slot.dataset = Arc::new(dataset);
        slot.refreshed_at = Some(Instant::now());
        Ok(Arc::clone(&slot.dataset))
    }

    async fn refresh(&self) -> Result<(Vec<CanonicalRecord>, RefreshReport), ServiceError> {
        let names: Vec<String> = self
            .store
            .list_blobs()
            .await?
            .into_iter()
            .filter(|n| n.ends_with(".csv"))
            .collect();

        let mut report = RefreshReport {
            listed: names.len(),
            ..Default::default()
        };

        let store = &self.store;
        let results: Vec<(String, Result<Vec<CanonicalRecord>, ServiceError>)> =
            stream::iter(names)
                .map(|name| async move {
                    let result = load_stored_file(store.as_ref(), &name).await;
                    (name, result)
                })
                .buffer_unordered(FETCH_CONCURRENCY)
                .collect()
                .await;

        let mut dataset = Vec::new();
        for (name, result) in results {
            match result {
                Ok(mut records) => {
                    report.loaded += 1;
                    dataset.append(&mut records);
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "skipping stored file");
                    report.skipped.push((name, e.to_string()));
                }
            }
        }

        Ok((dataset, report))
    }

    /// Sorted distinct plant states, lazily derived from the consolidated
    /// dataset and cached until the next successful upload.
    pub async fn states(&self) -> Result<Arc<Vec<String>>, ServiceError> {
        {
            let cached = self.states.lock().await;
            if let Some(states) = cached.as_ref() {
                return Ok(Arc::clone(states));
            }
        }

        let dataset = self.dataset().await?;
        let mut states: Vec<String> = dataset.iter().map(|r| r.plant_state.clone()).collect();
        states.sort();
        states.dedup();

        let states = Arc::new(states);
        *self.states.lock().await = Some(Arc::clone(&states));
        Ok(states)
    }

    /// Clears the states cache; called after a successful upload so the next
    /// read recomputes it.
    pub async fn invalidate_states(&self) {
        *self.states.lock().await = None;
    }
}

async fn load_stored_file(
    store: &dyn BlobStore,
    name: &str,
) -> Result<Vec<CanonicalRecord>, ServiceError> {
    let bytes = store.get_blob(name).await?;
    let table = decode_csv(&bytes)?;
    let batch = extract_canonical(&table)?;
    Ok(batch.records)
}
