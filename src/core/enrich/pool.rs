//! Bounded worker pool for metadata and blur enrichment.

use super::{CancellationToken, EnrichRequest, Enrichment, EnrichmentKind};
use crate::core::blur::BlurScorer;
use crate::core::cache::FileStamp;
use crate::core::group::{GroupFiles, GroupId};
use crate::core::metadata::MetadataExtractor;
use crate::core::preview::{DefaultPreviewDecoder, PreviewDecoder};
use crate::error::CullError;
use crate::events::{null_sender, EnrichEvent, Event, EventSender};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const IDLE_POLL: Duration = Duration::from_millis(20);

/// Default worker count: available cores, at most 4
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

/// Builder for the enrichment pool
pub struct EnrichmentPoolBuilder {
    workers: usize,
    extractor: Option<Arc<MetadataExtractor>>,
    scorer: Option<Arc<BlurScorer>>,
    decoder: Option<Arc<dyn PreviewDecoder>>,
    events: Option<EventSender>,
}

impl EnrichmentPoolBuilder {
    pub fn new() -> Self {
        Self {
            workers: default_workers(),
            extractor: None,
            scorer: None,
            decoder: None,
            events: None,
        }
    }

    /// Number of worker threads (at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn extractor(mut self, extractor: Arc<MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn scorer(mut self, scorer: Arc<BlurScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn PreviewDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Send progress events to this sender
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<EnrichmentPool, CullError> {
        let workers = self.workers;
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("enrich-{}", i))
            .build()
            .map_err(|e| CullError::WorkerPool(e.to_string()))?;
        let (sender, receiver) = unbounded();

        let scorer = self
            .scorer
            .unwrap_or_else(|| Arc::new(BlurScorer::in_memory(512)));
        debug!(
            "Enrichment pool started with {} workers, blur metric {}",
            workers,
            scorer.metric_name()
        );

        Ok(EnrichmentPool {
            threads,
            workers,
            worker: Arc::new(Worker {
                extractor: self
                    .extractor
                    .unwrap_or_else(|| Arc::new(MetadataExtractor::new())),
                scorer,
                decoder: self
                    .decoder
                    .unwrap_or_else(|| Arc::new(DefaultPreviewDecoder)),
                events: self.events.unwrap_or_else(null_sender),
                results: sender,
            }),
            receiver,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

impl Default for EnrichmentPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs enrichment tasks on a fixed number of threads.
///
/// Results arrive out of order; every result carries its group id. A task
/// whose token was cancelled skips the steps it has not started yet.
/// Results of steps that did run are still delivered.
pub struct EnrichmentPool {
    threads: rayon::ThreadPool,
    workers: usize,
    worker: Arc<Worker>,
    receiver: Receiver<Enrichment>,
    in_flight: Arc<AtomicUsize>,
    tokens: Arc<Mutex<HashMap<GroupId, CancellationToken>>>,
}

impl EnrichmentPool {
    pub fn builder() -> EnrichmentPoolBuilder {
        EnrichmentPoolBuilder::new()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queue metadata extraction and blur scoring for a group.
    pub fn submit(&self, files: GroupFiles) -> CancellationToken {
        self.submit_with(files, EnrichRequest::ALL)
    }

    /// Queue only the requested steps for a group.
    pub fn submit_with(&self, files: GroupFiles, request: EnrichRequest) -> CancellationToken {
        let token = CancellationToken::new();
        if request.is_empty() {
            return token;
        }

        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(files.id().clone(), token.clone());
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let worker = Arc::clone(&self.worker);
        let in_flight = Arc::clone(&self.in_flight);
        let tokens = Arc::clone(&self.tokens);
        let task_token = token.clone();

        self.threads.spawn(move || {
            worker.run(&files, request, &task_token);

            if let Ok(mut tokens) = tokens.lock() {
                if tokens
                    .get(files.id())
                    .map_or(false, |current| current.same_as(&task_token))
                {
                    tokens.remove(files.id());
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        token
    }

    /// Cancel a single group's pending work.
    pub fn cancel(&self, group_id: &GroupId) {
        if let Ok(tokens) = self.tokens.lock() {
            if let Some(token) = tokens.get(group_id) {
                token.cancel();
            }
        }
    }

    /// Cancel every queued task except the one for `keep`.
    ///
    /// Used when the cursor jumps far: work for the photo now on screen
    /// keeps running, everything else yields.
    pub fn cancel_all_except(&self, keep: &GroupId) -> usize {
        let Ok(tokens) = self.tokens.lock() else {
            return 0;
        };
        let mut cancelled = 0;
        for (id, token) in tokens.iter() {
            if id != keep && !token.is_cancelled() {
                token.cancel();
                cancelled += 1;
            }
        }
        debug!("Cancelled {} enrichment tasks", cancelled);
        cancelled
    }

    /// Results available right now, without blocking.
    pub fn drain(&self) -> Vec<Enrichment> {
        self.receiver.try_iter().collect()
    }

    /// Block until every submitted task has finished; returns all results.
    pub fn wait_idle(&self) -> Vec<Enrichment> {
        let mut results = Vec::new();
        loop {
            match self.receiver.recv_timeout(IDLE_POLL) {
                Ok(result) => results.push(result),
                Err(RecvTimeoutError::Timeout) => {
                    if self.in_flight.load(Ordering::SeqCst) == 0 {
                        results.extend(self.receiver.try_iter());
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        results
    }
}

/// Shared state for tasks running on the pool
struct Worker {
    extractor: Arc<MetadataExtractor>,
    scorer: Arc<BlurScorer>,
    decoder: Arc<dyn PreviewDecoder>,
    events: EventSender,
    results: Sender<Enrichment>,
}

impl Worker {
    fn run(&self, files: &GroupFiles, request: EnrichRequest, token: &CancellationToken) {
        if request.metadata {
            if token.is_cancelled() {
                self.cancelled(files);
                return;
            }
            self.extract_metadata(files);
        }

        if request.blur {
            if token.is_cancelled() {
                self.cancelled(files);
                return;
            }
            self.score_blur(files);
        }
    }

    fn extract_metadata(&self, files: &GroupFiles) {
        let id = files.id();
        let result = self.extractor.extract(files);
        let source = files.primary_path().to_path_buf();

        let kind = match FileStamp::of(&source) {
            Ok(stamp) => {
                self.events.send(Event::Enrich(EnrichEvent::MetadataReady {
                    group_id: id.to_string(),
                    fields: result.metadata.len(),
                }));
                EnrichmentKind::Metadata {
                    result,
                    source,
                    stamp,
                }
            }
            Err(e) => {
                let reason = format!("{}: {}", source.display(), e);
                self.failed(files, &reason);
                EnrichmentKind::Failed { reason }
            }
        };
        self.deliver(Enrichment::new(id.clone(), kind));
    }

    fn score_blur(&self, files: &GroupFiles) {
        let id = files.id();
        let kind = match self.scorer.score_with(files, self.decoder.as_ref()) {
            Ok(outcome) => {
                let event = if outcome.from_cache {
                    EnrichEvent::CacheHit {
                        group_id: id.to_string(),
                    }
                } else {
                    EnrichEvent::BlurScored {
                        group_id: id.to_string(),
                        score: outcome.score,
                    }
                };
                match outcome.into_cached() {
                    Some(cached) => {
                        self.events.send(Event::Enrich(event));
                        EnrichmentKind::Blur(cached)
                    }
                    None => {
                        let reason = format!("{} disappeared while scoring", files.preview_path().display());
                        self.failed(files, &reason);
                        EnrichmentKind::Failed { reason }
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                self.failed(files, &reason);
                EnrichmentKind::Failed { reason }
            }
        };
        self.deliver(Enrichment::new(id.clone(), kind));
    }

    fn cancelled(&self, files: &GroupFiles) {
        self.events.send(Event::Enrich(EnrichEvent::Cancelled {
            group_id: files.id().to_string(),
        }));
        self.deliver(Enrichment::new(files.id().clone(), EnrichmentKind::Cancelled));
    }

    fn failed(&self, files: &GroupFiles, reason: &str) {
        warn!("Enrichment failed for {}: {}", files.id(), reason);
        self.events.send(Event::Enrich(EnrichEvent::Error {
            group_id: files.id().to_string(),
            message: reason.to_string(),
        }));
    }

    fn deliver(&self, result: Enrichment) {
        // The pool owns the receiver, so this only fails while it is dropping.
        let _ = self.results.send(result);
    }
}
