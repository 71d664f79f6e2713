//! In-memory record store.
//!
//! Thread-safe reference implementation of `RecordStore` for embedded hosts,
//! tests and benches. Records keep insertion order per dataset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::record::{Document, RecordId};

use super::store::{RecordQuery, RecordStore};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct Dataset {
    records: Vec<Document>,
    by_id: HashMap<RecordId, usize>,
}

impl Dataset {
    fn upsert(&mut self, doc: Document) {
        if let Some(&idx) = self.by_id.get(&doc.id) {
            self.records[idx] = doc;
        } else {
            self.by_id.insert(doc.id, self.records.len());
            self.records.push(doc);
        }
    }
}

/// In-memory `RecordStore`.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    datasets: RwLock<HashMap<String, Dataset>>,
    logged: AtomicU64,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `dataset` (if needed) and upserts `records` into it.
    ///
    /// Seeding does not count towards `logged_count`.
    pub fn seed(&self, dataset: &str, records: impl IntoIterator<Item = Document>) -> Result<(), StoreError> {
        let mut datasets = self.datasets.write().map_err(|_| lock_err("datasets"))?;
        let ds = datasets.entry(dataset.to_string()).or_default();
        for doc in records {
            ds.upsert(doc);
        }
        Ok(())
    }

    /// Fetch one record by id.
    pub fn get(&self, dataset: &str, id: RecordId) -> Result<Option<Document>, StoreError> {
        let datasets = self.datasets.read().map_err(|_| lock_err("datasets"))?;
        let ds = datasets
            .get(dataset)
            .ok_or_else(|| StoreError::DatasetNotFound(dataset.to_string()))?;
        Ok(ds.by_id.get(&id).map(|&idx| ds.records[idx].clone()))
    }

    /// Number of records in a dataset.
    pub fn record_count(&self, dataset: &str) -> Result<usize, StoreError> {
        let datasets = self.datasets.read().map_err(|_| lock_err("datasets"))?;
        Ok(datasets.get(dataset).map_or(0, |ds| ds.records.len()))
    }

    /// Total records written through `log`.
    #[must_use]
    pub fn logged_count(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, dataset: &str, query: &RecordQuery, limit: Option<usize>) -> Result<Vec<Document>, StoreError> {
        let datasets = self.datasets.read().map_err(|_| lock_err("datasets"))?;
        let ds = datasets
            .get(dataset)
            .ok_or_else(|| StoreError::DatasetNotFound(dataset.to_string()))?;

        Ok(ds
            .records
            .iter()
            .filter(|doc| query.matches(doc))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn log(&self, dataset: &str, records: Vec<Document>) -> Result<(), StoreError> {
        let count = records.len() as u64;
        {
            let mut datasets = self.datasets.write().map_err(|_| lock_err("datasets"))?;
            let ds = datasets.entry(dataset.to_string()).or_default();
            for doc in records {
                ds.upsert(doc);
            }
        }
        self.logged.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_replaces_by_id_and_keeps_order() {
        let store = InMemoryRecordStore::new();
        let a = Document::from_text("a");
        let b = Document::from_text("b");
        store.seed("ds", [a.clone(), b.clone()]).unwrap();

        let mut a2 = a.clone();
        a2.text = Some("a2".to_string());
        store.log("ds", vec![a2]).unwrap();

        let all = store.load("ds", &RecordQuery::All, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[0].text.as_deref(), Some("a2"));
        assert_eq!(all[1].id, b.id);
        assert_eq!(store.logged_count(), 1);
    }

    #[test]
    fn load_filters_and_limits() {
        let store = InMemoryRecordStore::new();
        store
            .seed(
                "ds",
                ["cat one", "dog", "cat two", "cat three"].map(Document::from_text),
            )
            .unwrap();
        let query = RecordQuery::ContainsAny {
            words: vec!["cat".to_string()],
            case_sensitive: true,
        };
        let loaded = store.load("ds", &query, Some(2)).unwrap();
        let texts: Vec<_> = loaded.iter().filter_map(|d| d.text.as_deref()).collect();
        assert_eq!(texts, vec!["cat one", "cat two"]);
    }

    #[test]
    fn unknown_dataset_is_an_error() {
        let store = InMemoryRecordStore::new();
        let err = store.load("missing", &RecordQuery::All, None).unwrap_err();
        assert_eq!(err, StoreError::DatasetNotFound("missing".to_string()));
        assert_eq!(store.record_count("missing").unwrap(), 0);
    }

    #[test]
    fn get_returns_latest_version() {
        let store = InMemoryRecordStore::new();
        let doc = Document::from_text("x");
        store.seed("ds", [doc.clone()]).unwrap();
        assert_eq!(store.get("ds", doc.id).unwrap(), Some(doc));
        assert_eq!(store.get("ds", RecordId::new()).unwrap(), None);
    }

    #[test]
    fn concurrent_logs_are_all_counted() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.log("ds", vec![Document::from_text("x")]).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(store.logged_count(), 100);
        assert_eq!(store.record_count("ds").unwrap(), 100);
    }
}
