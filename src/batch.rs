//! Batch coordination
//!
//! A batch run owns a fixed, ordered list of [`BatchItem`]s. Items are
//! processed by a bounded pool of workers; every completion updates its
//! item in place and emits exactly one [`BatchProgressEvent`]. Completion
//! order is not submission order, so consumers must key updates by
//! `index`.
//!
//! Item lifecycle: `Pending -> Processing -> Done | Error`. Terminal states
//! never change. All items move to `Processing` together when the run
//! starts, before any completion is reported.

use crate::{
    config::{CoordinatorConfig, ProcessOptions},
    error::{NoBgError, Result},
    processor::SingleImageProcessor,
    services::ExportUnit,
    types::{display_name_for, EncodedImage, ImageSource},
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

/// Status of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One unit of a batch run.
///
/// `result` is present only when `Done`, `error` only when `Error`.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Unique for the lifetime of the run
    pub id: Uuid,
    /// Position in submission order
    pub index: usize,
    /// Final path segment of the source
    pub name: String,
    pub source_path: PathBuf,
    pub status: ItemStatus,
    pub result: Option<Arc<EncodedImage>>,
    pub error: Option<NoBgError>,
}

impl BatchItem {
    /// New `Pending` item
    #[must_use]
    pub fn new(index: usize, source_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            name: display_name_for(&source_path),
            source_path,
            status: ItemStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// `Pending -> Processing`; returns `false` from any other state
    pub fn begin(&mut self) -> bool {
        if self.status != ItemStatus::Pending {
            return false;
        }
        self.status = ItemStatus::Processing;
        true
    }

    /// `Processing -> Done | Error`; returns `false` from any other state
    pub fn complete(&mut self, outcome: Result<EncodedImage>) -> bool {
        if self.status != ItemStatus::Processing {
            return false;
        }
        match outcome {
            Ok(image) => {
                self.status = ItemStatus::Done;
                self.result = Some(Arc::new(image));
            },
            Err(error) => {
                self.status = ItemStatus::Error;
                self.error = Some(error);
            },
        }
        true
    }

    /// Human-readable failure cause
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    fn export_unit(&self) -> Option<ExportUnit> {
        self.result.as_ref().map(|image| {
            ExportUnit::new(
                self.name.clone(),
                Some(self.source_path.clone()),
                Arc::clone(image),
            )
        })
    }
}

/// Emitted once per item, after it reaches a terminal status
#[derive(Debug, Clone)]
pub struct BatchProgressEvent {
    /// Item position in submission order
    pub index: usize,
    /// Item count of the run, constant across its events
    pub total: usize,
    pub id: Uuid,
    pub name: String,
    pub result: Option<Arc<EncodedImage>>,
    pub error: Option<NoBgError>,
}

impl BatchProgressEvent {
    fn from_item(item: &BatchItem, total: usize) -> Self {
        Self {
            index: item.index,
            total,
            id: item.id,
            name: item.name.clone(),
            result: item.result.clone(),
            error: item.error.clone(),
        }
    }

    #[must_use]
    pub fn status(&self) -> ItemStatus {
        if self.error.is_some() {
            ItemStatus::Error
        } else {
            ItemStatus::Done
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Status counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn from_items(items: &[BatchItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status {
                ItemStatus::Pending => summary.pending += 1,
                ItemStatus::Processing => summary.processing += 1,
                ItemStatus::Done => summary.done += 1,
                ItemStatus::Error => summary.failed += 1,
            }
        }
        summary
    }

    /// Every item reached a terminal status
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done + self.failed == self.total
    }
}

#[derive(Debug)]
struct RunState {
    active: bool,
    items: Vec<BatchItem>,
    sender: Option<mpsc::UnboundedSender<BatchProgressEvent>>,
    remaining: usize,
}

type SharedRun = Arc<Mutex<RunState>>;

fn lock_run(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Handle to a submitted run.
///
/// Clones observe the same run. After [`BatchCoordinator::reset`] the
/// handle reports no items.
#[derive(Clone)]
pub struct BatchRun {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    total: usize,
    snapshot: Vec<BatchItem>,
    state: SharedRun,
}

impl std::fmt::Debug for BatchRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRun")
            .field("run_id", &self.run_id)
            .field("total", &self.total)
            .field("summary", &self.summary())
            .finish_non_exhaustive()
    }
}

impl BatchRun {
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Item count at submission
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items as they were when the run started (all `Processing`)
    #[must_use]
    pub fn initial_items(&self) -> &[BatchItem] {
        &self.snapshot
    }

    /// Current state of every item
    #[must_use]
    pub fn items(&self) -> Vec<BatchItem> {
        lock_run(&self.state).items.clone()
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<BatchItem> {
        lock_run(&self.state).items.get(index).cloned()
    }

    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_items(&lock_run(&self.state).items)
    }

    /// `false` once the run has been reset or replaced
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock_run(&self.state).active
    }

    /// Saveable units for every `Done` item, in submission order
    #[must_use]
    pub fn results(&self) -> Vec<ExportUnit> {
        lock_run(&self.state)
            .items
            .iter()
            .filter_map(BatchItem::export_unit)
            .collect()
    }

    /// Saveable unit for one item, if it is `Done`
    #[must_use]
    pub fn result(&self, index: usize) -> Option<ExportUnit> {
        lock_run(&self.state)
            .items
            .get(index)
            .and_then(BatchItem::export_unit)
    }

    fn deactivate(&self) {
        let mut run = lock_run(&self.state);
        run.active = false;
        run.items.clear();
        run.sender = None;
    }
}

/// Progress events of one run.
///
/// Ends after the last item's event, or as soon as the run is reset.
/// Usable as a [`futures::Stream`] or by polling with
/// [`try_next_event`](Self::try_next_event).
#[derive(Debug)]
pub struct BatchEventStream {
    receiver: mpsc::UnboundedReceiver<BatchProgressEvent>,
    state: SharedRun,
}

impl BatchEventStream {
    /// Wait for the next event; `None` when the run is finished or discarded
    pub async fn next_event(&mut self) -> Option<BatchProgressEvent> {
        if !lock_run(&self.state).active {
            return None;
        }
        let event = self.receiver.recv().await?;
        lock_run(&self.state).active.then_some(event)
    }

    /// Next event if one is ready, without waiting
    pub fn try_next_event(&mut self) -> Option<BatchProgressEvent> {
        if !lock_run(&self.state).active {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

impl Stream for BatchEventStream {
    type Item = BatchProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !lock_run(&self.state).active {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if lock_run(&self.state).active {
                    Poll::Ready(Some(event))
                } else {
                    Poll::Ready(None)
                }
            },
            other => other,
        }
    }
}

/// Runs batches of path sources through a [`SingleImageProcessor`].
///
/// Holds at most one active run; submitting a new batch discards the
/// previous one.
pub struct BatchCoordinator {
    processor: SingleImageProcessor,
    config: CoordinatorConfig,
    current: Mutex<Option<BatchRun>>,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("config", &self.config)
            .field("current", &self.current_run())
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    #[must_use]
    pub fn new(processor: SingleImageProcessor, config: CoordinatorConfig) -> Self {
        Self {
            processor,
            config,
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Start a run over `paths` in order.
    ///
    /// Returns the run handle, whose initial snapshot already shows every
    /// item `Processing`, and the run's event stream. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    /// - `InvalidConfig` when called outside a Tokio runtime
    #[instrument(skip(self, paths, options), fields(items = paths.len()))]
    pub fn submit(
        &self,
        paths: Vec<PathBuf>,
        options: ProcessOptions,
    ) -> Result<(BatchRun, BatchEventStream)> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NoBgError::invalid_config("batch processing requires a running Tokio runtime")
        })?;
        self.reset();

        let total = paths.len();
        let mut items: Vec<BatchItem> = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| BatchItem::new(index, path))
            .collect();
        for item in &mut items {
            item.begin();
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let state: SharedRun = Arc::new(Mutex::new(RunState {
            active: true,
            items: items.clone(),
            sender: (total > 0).then_some(sender),
            remaining: total,
        }));

        let run = BatchRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            total,
            snapshot: items,
            state: Arc::clone(&state),
        };
        *self.lock_current() = Some(run.clone());

        let workers = self.config.effective_workers().max(1);
        info!(
            run_id = %run.run_id,
            total,
            workers,
            "Starting batch run"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        for item in run.initial_items() {
            let task = ItemTask {
                index: item.index,
                source: ImageSource::Path(item.source_path.clone()),
                options,
                processor: self.processor.clone(),
                state: Arc::clone(&state),
            };
            let permits = Arc::clone(&semaphore);
            let span = tracing::info_span!("batch_item", index = item.index, name = %item.name);
            runtime.spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    task.run().await;
                }
                .instrument(span),
            );
        }

        let events = BatchEventStream { receiver, state };
        Ok((run, events))
    }

    /// The active run, if any
    #[must_use]
    pub fn current_run(&self) -> Option<BatchRun> {
        self.lock_current().clone()
    }

    /// Discard the active run.
    ///
    /// Workers already running finish their computation, but their results
    /// are dropped and no further events are delivered.
    pub fn reset(&self) {
        if let Some(run) = self.lock_current().take() {
            debug!(run_id = %run.run_id, "Discarding batch run");
            run.deactivate();
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<BatchRun>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

struct ItemTask {
    index: usize,
    source: ImageSource,
    options: ProcessOptions,
    processor: SingleImageProcessor,
    state: SharedRun,
}

impl ItemTask {
    async fn run(self) {
        if !lock_run(&self.state).active {
            return;
        }

        let Self {
            index,
            source,
            options,
            processor,
            state,
        } = self;
        let outcome = tokio::task::spawn_blocking(move || processor.process(&source, &options))
            .await
            .unwrap_or_else(|join_error| {
                Err(NoBgError::inference(format!("worker stopped unexpectedly: {join_error}")))
            });

        Self::record(&state, index, outcome);
    }

    fn record(state: &Mutex<RunState>, index: usize, outcome: Result<EncodedImage>) {
        let mut run = lock_run(state);
        if !run.active {
            debug!(index, "Dropping result for a discarded run");
            return;
        }

        let total = run.items.len();
        let event = {
            let Some(item) = run.items.get_mut(index) else {
                return;
            };
            if !item.complete(outcome) {
                return;
            }
            if let Some(error) = &item.error {
                warn!(index, name = %item.name, "Batch item failed: {error}");
            }
            BatchProgressEvent::from_item(item, total)
        };

        run.remaining = run.remaining.saturating_sub(1);
        if let Some(sender) = &run.sender {
            let _ = sender.send(event);
        }
        if run.remaining == 0 {
            run.sender = None;
            info!(total, "Batch run complete");
        }
    }
}
