//! Listener trait and the runner that triggers it.
//!
//! A trigger loads the records matching the listener's query and hands them
//! to `on_batch` together with a mutable context. `run_once` performs one
//! trigger on the caller's thread; `spawn` moves the runner onto a worker
//! thread that triggers every `interval` until stopped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::error::{ListenerError, ListenerResult};
use crate::record::Document;

use super::store::{RecordQuery, RecordStore};

/// A background plugin reacting to dataset records.
pub trait Listener: Send {
    /// Name used in logs and for the worker thread.
    fn name(&self) -> &str;

    /// Which records a trigger delivers.
    fn query(&self) -> RecordQuery;

    /// Handle one batch of matched records.
    fn on_batch(&mut self, records: Vec<Document>, ctx: &mut ListenerContext<'_>) -> ListenerResult<()>;
}

/// Mutable per-trigger context handed to `on_batch`.
pub struct ListenerContext<'a> {
    dataset: &'a str,
    store: &'a dyn RecordStore,
    execution: u64,
    logged: usize,
}

impl<'a> ListenerContext<'a> {
    /// Creates a context for one trigger.
    #[must_use]
    pub fn new(dataset: &'a str, store: &'a dyn RecordStore, execution: u64) -> Self {
        Self {
            dataset,
            store,
            execution,
            logged: 0,
        }
    }

    /// Dataset the listener is attached to.
    #[must_use]
    pub const fn dataset(&self) -> &str {
        self.dataset
    }

    /// 1-based index of the current trigger.
    #[must_use]
    pub const fn execution(&self) -> u64 {
        self.execution
    }

    /// Records logged so far during this trigger.
    #[must_use]
    pub const fn logged(&self) -> usize {
        self.logged
    }

    /// Load more records from the dataset.
    pub fn load(&self, query: &RecordQuery, limit: Option<usize>) -> ListenerResult<Vec<Document>> {
        Ok(self.store.load(self.dataset, query, limit)?)
    }

    /// Write records back to the dataset. Empty batches are not sent.
    pub fn log(&mut self, records: Vec<Document>) -> ListenerResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        self.store.log(self.dataset, records)?;
        self.logged += count;
        Ok(())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct ListenerRunnerConfig {
    /// Max records delivered per trigger.
    pub limit: Option<usize>,
    /// Delay between triggers when spawned.
    pub interval: Duration,
}

impl Default for ListenerRunnerConfig {
    fn default() -> Self {
        Self {
            limit: None,
            interval: Duration::from_secs(30),
        }
    }
}

/// Outcome of one trigger.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub execution: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub matched: usize,
    pub logged: usize,
}

/// Counters collected by a spawned runner.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub executions: u64,
    pub failures: u64,
}

/// Drives one listener against one dataset.
pub struct ListenerRunner<L> {
    dataset: String,
    store: Arc<dyn RecordStore>,
    listener: L,
    cfg: ListenerRunnerConfig,
    executions: u64,
}

impl<L: Listener> ListenerRunner<L> {
    /// Attach `listener` to `dataset`.
    pub fn new(dataset: impl Into<String>, store: Arc<dyn RecordStore>, listener: L, cfg: ListenerRunnerConfig) -> Self {
        Self {
            dataset: dataset.into(),
            store,
            listener,
            cfg,
            executions: 0,
        }
    }

    /// The wrapped listener.
    #[must_use]
    pub const fn listener(&self) -> &L {
        &self.listener
    }

    /// Unwrap the listener.
    #[must_use]
    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Triggers performed so far.
    #[must_use]
    pub const fn executions(&self) -> u64 {
        self.executions
    }

    /// Perform one trigger.
    pub fn run_once(&mut self) -> ListenerResult<BatchReport> {
        let started_at = Utc::now();
        self.executions += 1;

        let query = self.listener.query();
        let records = self.store.load(&self.dataset, &query, self.cfg.limit)?;
        let matched = records.len();

        let mut ctx = ListenerContext::new(&self.dataset, self.store.as_ref(), self.executions);
        self.listener.on_batch(records, &mut ctx)?;
        let logged = ctx.logged();

        tracing::debug!(
            listener = self.listener.name(),
            dataset = %self.dataset,
            execution = self.executions,
            matched,
            logged,
            "trigger finished"
        );

        Ok(BatchReport {
            execution: self.executions,
            started_at,
            finished_at: Utc::now(),
            matched,
            logged,
        })
    }
}

impl<L: Listener + 'static> ListenerRunner<L> {
    /// Move the runner onto a worker thread that triggers every `interval`.
    ///
    /// A failed trigger is logged and counted; the worker keeps running.
    pub fn spawn(self) -> ListenerResult<RunnerHandle<L>> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let name = format!("listener-{}", self.listener.name());
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || worker_loop(self, stop_rx))
            .map_err(|e| ListenerError::internal(format!("failed to spawn listener worker: {e}")))?;

        Ok(RunnerHandle {
            stop_tx,
            join: Some(join),
        })
    }
}

/// Handle to a spawned runner.
///
/// Dropping the handle signals the worker to stop without waiting for it.
pub struct RunnerHandle<L> {
    stop_tx: Sender<()>,
    join: Option<JoinHandle<(ListenerRunner<L>, RunnerStats)>>,
}

impl<L> RunnerHandle<L> {
    /// Stop the worker, wait for it, and give the runner back.
    pub fn stop(mut self) -> ListenerResult<(ListenerRunner<L>, RunnerStats)> {
        let _ = self.stop_tx.try_send(());
        let join = self
            .join
            .take()
            .ok_or_else(|| ListenerError::internal("listener worker already stopped"))?;
        join.join()
            .map_err(|_| ListenerError::internal("listener worker panicked"))
    }
}

impl<L> Drop for RunnerHandle<L> {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.stop_tx.try_send(());
        }
    }
}

fn worker_loop<L: Listener>(mut runner: ListenerRunner<L>, stop_rx: Receiver<()>) -> (ListenerRunner<L>, RunnerStats) {
    let mut stats = RunnerStats::default();
    let interval = runner.cfg.interval;

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(interval) => {
                stats.executions += 1;
                if let Err(e) = runner.run_once() {
                    stats.failures += 1;
                    tracing::warn!(
                        listener = runner.listener.name(),
                        dataset = %runner.dataset,
                        error = %e,
                        retryable = e.is_retryable(),
                        "trigger failed"
                    );
                }
            }
        }
    }

    (runner, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::InMemoryRecordStore;

    struct Upper {
        seen: usize,
    }

    impl Listener for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn query(&self) -> RecordQuery {
            RecordQuery::All
        }

        fn on_batch(&mut self, records: Vec<Document>, ctx: &mut ListenerContext<'_>) -> ListenerResult<()> {
            self.seen += records.len();
            let updated = records
                .into_iter()
                .filter(|d| d.text.as_deref().is_some_and(|t| t.chars().any(char::is_lowercase)))
                .map(|mut d| {
                    d.text = d.text.map(|t| t.to_uppercase());
                    d
                })
                .collect();
            ctx.log(updated)
        }
    }

    fn store_with(texts: &[&str]) -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .seed("ds", texts.iter().map(|t| Document::from_text(*t)))
            .unwrap();
        store
    }

    #[test]
    fn run_once_reports_counts() {
        let store = store_with(&["a", "B", "c"]);
        let mut runner = ListenerRunner::new("ds", store.clone(), Upper { seen: 0 }, ListenerRunnerConfig::default());

        let report = runner.run_once().unwrap();
        assert_eq!(report.execution, 1);
        assert_eq!(report.matched, 3);
        assert_eq!(report.logged, 2);
        assert!(report.finished_at >= report.started_at);

        let second = runner.run_once().unwrap();
        assert_eq!(second.execution, 2);
        assert_eq!(second.logged, 0);
        assert_eq!(runner.listener().seen, 6);
    }

    #[test]
    fn run_once_respects_limit() {
        let store = store_with(&["a", "b", "c"]);
        let cfg = ListenerRunnerConfig {
            limit: Some(2),
            ..ListenerRunnerConfig::default()
        };
        let mut runner = ListenerRunner::new("ds", store, Upper { seen: 0 }, cfg);
        assert_eq!(runner.run_once().unwrap().matched, 2);
    }

    #[test]
    fn missing_dataset_surfaces_store_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let mut runner = ListenerRunner::new("nope", store, Upper { seen: 0 }, ListenerRunnerConfig::default());
        let err = runner.run_once().unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn spawned_runner_triggers_until_stopped() {
        let store = store_with(&["a"]);
        let cfg = ListenerRunnerConfig {
            limit: None,
            interval: Duration::from_millis(5),
        };
        let handle = ListenerRunner::new("ds", store.clone(), Upper { seen: 0 }, cfg)
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(100));
        let (runner, stats) = handle.stop().unwrap();

        assert!(stats.executions >= 1);
        assert_eq!(stats.failures, 0);
        assert_eq!(runner.executions(), stats.executions);
        assert_eq!(store.logged_count(), 1);
    }

    #[test]
    fn spawned_runner_counts_failures() {
        let store = Arc::new(InMemoryRecordStore::new());
        let cfg = ListenerRunnerConfig {
            limit: None,
            interval: Duration::from_millis(5),
        };
        let handle = ListenerRunner::new("missing", store, Upper { seen: 0 }, cfg)
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(60));
        let (_, stats) = handle.stop().unwrap();
        assert!(stats.failures >= 1);
        assert_eq!(stats.failures, stats.executions);
    }
}
