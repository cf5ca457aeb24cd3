//! Batch orchestrator: fans items out over a bounded worker pool.
//!
//! Documents are expanded into one item per allowed page before any page is
//! rendered. Items flow to the workers through a bounded channel, so at most
//! `workers + lookahead` sources are in flight and images are only
//! materialized inside a worker. A failure (including a panic) is recorded
//! against its item and never stops the batch.

use crate::config::ScanOptions;
use crate::error::{ItemOutcome, ScanError};
use crate::models::{BarcodeResult, QualityNote, SourceRef};
use crate::normalizer::{DocumentSource, Source, normalize, normalize_page};
use crate::pipeline::Pipeline;
use crossbeam_channel::{Receiver, bounded};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, debug_span, warn};

/// Cooperative cancellation signal, checked between items
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the batch to stop picking up new items
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Progress snapshot handed to the callback after every item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Items finished so far
    pub completed: usize,
    /// Items in the batch
    pub total: usize,
}

type ProgressFn = dyn Fn(Progress) + Send + Sync;

/// What happened to one item (a file, buffer, stream, bitmap or page)
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    /// Where the item came from
    pub source: SourceRef,
    /// Results or failure
    pub outcome: ItemOutcome,
    /// Resampling applied while scanning
    pub notes: Vec<QualityNote>,
    /// Wall time spent on the item
    pub elapsed: Duration,
}

/// Everything a batch produced, ordered by source index then page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// One entry per item
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    /// All results in output order: by source and page, then by descending
    /// confidence
    pub fn results(&self) -> impl Iterator<Item = &BarcodeResult> {
        self.items.iter().flat_map(|i| i.outcome.results())
    }

    /// Items that failed
    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Failed(_)))
    }
}

/// Failure to set up a batch
#[derive(Error, Debug)]
pub enum BatchError {
    /// The worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

enum WorkItem {
    Single(Source, SourceRef),
    Page(DocumentSource, usize, SourceRef),
    Rejected(SourceRef, ScanError),
}

impl WorkItem {
    fn source(&self) -> &SourceRef {
        match self {
            WorkItem::Single(_, r) | WorkItem::Page(_, _, r) | WorkItem::Rejected(r, _) => r,
        }
    }
}

/// Scans many sources in parallel
pub struct BatchScanner {
    pipeline: Pipeline,
    pool: rayon::ThreadPool,
    cancel: CancellationToken,
    progress: Option<Arc<ProgressFn>>,
}

impl std::fmt::Debug for BatchScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScanner")
            .field("options", self.pipeline.options())
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl BatchScanner {
    /// Batch scanner with its own pool; `max_parallel_threads = 0` uses one
    /// worker per core
    pub fn new(options: ScanOptions) -> Result<Self, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_parallel_threads)
            .thread_name(|i| format!("barcode-worker-{i}"))
            .build()?;
        Ok(Self {
            pipeline: Pipeline::new(options),
            pool,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Call `f` after every finished item
    pub fn with_progress(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Token that cancels the running batch, or the next one when none is
    /// running. Each batch clears it on return.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Scan every source; the report has one item per source, or one per
    /// scanned page for documents
    pub fn process_many(&self, sources: Vec<Source>) -> BatchReport {
        let items = expand(sources);
        let total = items.len();
        let workers = self.workers().max(1);
        let lookahead = self.pipeline.options().lookahead;
        debug!(total, workers, lookahead, "batch started");

        let (sender, receiver) = bounded::<WorkItem>(lookahead.max(1));
        let collected = Mutex::new(Vec::with_capacity(total));
        let completed = AtomicUsize::new(0);

        self.pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let receiver = receiver.clone();
                let (collected, completed) = (&collected, &completed);
                scope.spawn(move |_| self.drain(receiver, collected, completed, total));
            }
            for item in items {
                if sender.send(item).is_err() {
                    break;
                }
            }
            drop(sender);
        });

        self.cancel.reset();

        let mut items = collected.into_inner();
        items.sort_by(|a: &ItemReport, b: &ItemReport| {
            (a.source.index, a.source.page).cmp(&(b.source.index, b.source.page))
        });
        debug!(
            items = items.len(),
            failed = items
                .iter()
                .filter(|i| matches!(i.outcome, ItemOutcome::Failed(_)))
                .count(),
            "batch finished"
        );
        BatchReport { items }
    }

    fn drain(
        &self,
        receiver: Receiver<WorkItem>,
        collected: &Mutex<Vec<ItemReport>>,
        completed: &AtomicUsize,
        total: usize,
    ) {
        while let Ok(item) = receiver.recv() {
            let report = if self.cancel.is_cancelled() {
                ItemReport {
                    source: item.source().clone(),
                    outcome: ItemOutcome::Failed(ScanError::Cancelled),
                    notes: Vec::new(),
                    elapsed: Duration::ZERO,
                }
            } else {
                self.process_item(item)
            };
            collected.lock().push(report);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &self.progress {
                progress(Progress {
                    completed: done,
                    total,
                });
            }
        }
    }

    fn process_item(&self, item: WorkItem) -> ItemReport {
        let source = item.source().clone();
        let span = debug_span!("item", index = source.index, page = ?source.page);
        let _guard = span.enter();
        let started = Instant::now();
        let options = self.pipeline.options();
        let deadline = options.item_timeout().map(|t| started + t);

        let run = catch_unwind(AssertUnwindSafe(|| {
            let image = match item {
                WorkItem::Single(s, origin) => normalize(s, origin, options)?,
                WorkItem::Page(doc, page, origin) => normalize_page(&doc, page, origin, options)?,
                WorkItem::Rejected(_, e) => return Err(e),
            };
            if let Some(d) = deadline
                && Instant::now() >= d
            {
                return Err(ScanError::ItemTimeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            self.pipeline.scan(&image, deadline)
        }));

        let (outcome, notes) = match run {
            Ok(Ok(scan)) => (ItemOutcome::from_results(Ok(scan.results)), scan.notes),
            Ok(Err(e)) => (ItemOutcome::Failed(e), Vec::new()),
            Err(panic) => (
                ItemOutcome::Failed(ScanError::ItemProcessingError(panic_message(&*panic))),
                Vec::new(),
            ),
        };
        if let ItemOutcome::Failed(e) = &outcome {
            warn!(source = %source.label, error = %e, "item failed");
        }
        ItemReport {
            source,
            outcome,
            notes,
            elapsed: started.elapsed(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown".to_string());
    format!("panic: {detail}")
}

/// One work item per source, documents replaced by their allowed pages
fn expand(sources: Vec<Source>) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(sources.len());
    for (index, source) in sources.into_iter().enumerate() {
        let mut origin = SourceRef::new(index, source.label());
        let Source::Document(doc) = source else {
            items.push(WorkItem::Single(source, origin));
            continue;
        };
        let id: Arc<str> = Arc::from(doc.renderer.document_id());
        origin.document = Some(id.clone());
        let count = match doc.renderer.page_count() {
            Ok(n) => n,
            Err(e) => {
                items.push(WorkItem::Rejected(origin, e));
                continue;
            }
        };
        let mut pages: Vec<usize> = match &doc.pages {
            Some(allowed) => allowed.iter().copied().filter(|&p| p < count).collect(),
            None => (0..count).collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        debug!(document = %id, count, scanned = pages.len(), "expanded document");
        for page in pages {
            let page_ref = SourceRef {
                page: Some(page),
                label: format!("{id}#{page}"),
                ..origin.clone()
            };
            items.push(WorkItem::Page(doc.clone(), page, page_ref));
        }
    }
    items
}
