//! One translation session, from first model call to terminal event.
//!
//! ## State machine
//!
//! ```text
//! Starting ──▶ Translating ──▶ Finalizing ──▶ Complete
//!    │            │  ▲ │
//!    │            │  └─┘ increment → Chunk
//!    │            ├──▶ (transient failure) backoff, retry ──▶ Translating
//!    ├────────────┴──▶ Failed      (attempts exhausted, or rejected)
//!    └────────────────▶ Cancelled  (caller cancelled)
//! ```
//!
//! A session is owned by the task that runs it. Nothing else reads or writes
//! its state, so none of it is behind a lock; the caller talks to it only
//! through the event channel and the cancel flag.
//!
//! ## Retries never repeat text
//!
//! Every attempt starts from scratch: the model regenerates the translation
//! from the top. The [`ChunkAggregator`] keeps the text already delivered to
//! the caller and suppresses the regenerated prefix, so a caller that
//! concatenates all `Chunk` deltas gets each character exactly once, and the
//! `Final` event's `text` is exactly that concatenation.
//!
//! ## Timeouts and cancellation
//!
//! Each attempt (the call plus draining its increments) has an
//! `attempt_timeout` budget; expiry is a transient failure like any transport
//! error. Only time spent waiting on the model counts against the budget:
//! while a `Chunk` waits for room in the event channel the clock is stopped,
//! so a slow consumer never turns text the aggregator has already accepted
//! into a lost delta.
//!
//! Backoff sleeps, attempts and the `Final` send all race the cancel flag.
//! Cancelling drops the in-flight call, emits `Cancelled` and ends the
//! session without another attempt.

use crate::archive::Archive;
use crate::client::{ModelClient, TextIncrement};
use crate::config::TranslatorConfig;
use crate::error::ModelError;
use crate::event::SessionEvent;
use crate::language::{detect_script, Language};
use crate::output::SessionStats;
use crate::pipeline::aggregate::ChunkAggregator;
use crate::pipeline::{parse, sanitize};
use crate::request::TranslationRequest;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Translating,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Bounded exponential backoff with a per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
        }
    }

    /// Wait before attempt `attempt` (1-based): nothing before the first,
    /// then `base`, `2 × base`, `4 × base`, …
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_backoff.saturating_mul(factor)
    }
}

/// How one attempt ended.
enum AttemptEnd {
    Completed { source_language: Option<Language> },
    Failed(ModelError),
    Cancelled,
    ReceiverGone,
}

/// The orchestrator for one request.
pub struct StreamSession {
    document_id: String,
    request: TranslationRequest,
    client: Arc<dyn ModelClient>,
    archive: Option<Arc<dyn Archive>>,
    policy: RetryPolicy,
    expected_chars: usize,
    events: mpsc::Sender<SessionEvent>,
    cancel: watch::Receiver<bool>,
    state: SessionState,
    started: Instant,
}

impl StreamSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        document_id: String,
        request: TranslationRequest,
        client: Arc<dyn ModelClient>,
        archive: Option<Arc<dyn Archive>>,
        policy: RetryPolicy,
        expected_chars: usize,
        events: mpsc::Sender<SessionEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            document_id,
            request,
            client,
            archive,
            policy,
            expected_chars,
            events,
            cancel,
            state: SessionState::Starting,
            started: Instant::now(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to a terminal state, emitting its events.
    pub async fn run(mut self) -> SessionState {
        let target = self.request.target();
        debug!(
            "[{}] Session starting: {} bytes → {}",
            self.document_id,
            self.request.input_size(),
            target
        );

        let start = SessionEvent::Start {
            document_id: self.document_id.clone(),
            input_size: self.request.input_size(),
            target_language: target,
        };
        if !self.emit(start).await {
            return self.abandon();
        }
        self.transition(SessionState::Translating);

        let mut cancel = self.cancel.clone();
        let mut aggregator = ChunkAggregator::new(self.expected_chars);
        let mut last_error: Option<ModelError> = None;
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            if attempt > 1 {
                let backoff = self.policy.backoff_before(attempt);
                warn!(
                    "[{}] Retry {}/{} after {}ms",
                    self.document_id,
                    attempt,
                    max,
                    backoff.as_millis()
                );
                let cancelled = tokio::select! {
                    biased;
                    _ = wait_cancelled(&mut cancel) => true,
                    _ = sleep(backoff) => false,
                };
                if cancelled {
                    return self.cancel_session().await;
                }
            }

            aggregator.begin_attempt();
            let end = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel) => AttemptEnd::Cancelled,
                end = drive_attempt(
                    self.client.as_ref(),
                    &self.request,
                    &mut aggregator,
                    &self.events,
                    &self.document_id,
                    self.policy.attempt_timeout,
                ) => end,
            };

            let failure = match end {
                AttemptEnd::Completed { source_language } => {
                    let produced = aggregator.attempt_chars();
                    let delivered = aggregator.watermark();
                    if produced == 0 {
                        ModelError::Transport("model returned no text".into())
                    } else if produced < delivered {
                        // The caller already holds more than this attempt wrote.
                        ModelError::Transport(format!(
                            "model output ended after {} chars, short of the {} already delivered",
                            produced, delivered
                        ))
                    } else {
                        return self.finalize(aggregator, source_language).await;
                    }
                }
                AttemptEnd::Failed(e) => e,
                AttemptEnd::Cancelled => return self.cancel_session().await,
                AttemptEnd::ReceiverGone => return self.abandon(),
            };

            if !failure.is_transient() {
                return self.fail(failure.to_string(), false).await;
            }
            warn!(
                "[{}] Attempt {}/{} failed: {}",
                self.document_id, attempt, max, failure
            );
            last_error = Some(failure);
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        self.fail(message, true).await
    }

    async fn finalize(
        mut self,
        aggregator: ChunkAggregator,
        source_language: Option<Language>,
    ) -> SessionState {
        if *self.cancel.borrow() {
            return self.cancel_session().await;
        }
        self.transition(SessionState::Finalizing);
        let target = self.request.target();

        let mut stats = SessionStats {
            attempts: aggregator.attempts(),
            chunks: aggregator.chunks_emitted(),
            chars: aggregator.watermark(),
            degradations: 0,
            divergent_attempts: aggregator.divergent_attempts(),
        };
        let text = aggregator.into_delivered();

        let dialect = self.request.model().dialect();
        let parsed = parse::parse_with_report(&sanitize::clean_text(&text, dialect), dialect);
        for d in &parsed.degradations {
            debug!("[{}] Parse degradation at {}", self.document_id, d);
        }
        stats.degradations = parsed.degradations.len();
        let document = sanitize::sanitize(parsed.document);

        if let Some(script) = detect_script(&text) {
            if script != target.script() {
                warn!(
                    "[{}] Output looks like {:?} script, expected {:?} for {}",
                    self.document_id,
                    script,
                    target.script(),
                    target
                );
            }
        }
        let detected_language =
            source_language.unwrap_or_else(|| Language::default_source_for(target));

        let elapsed_secs = self.elapsed_secs();
        let archived_text = document.to_markdown();
        let event = SessionEvent::Final {
            document_id: self.document_id.clone(),
            document,
            text,
            detected_language,
            target_language: target,
            progress: 100,
            elapsed_secs,
            stats: stats.clone(),
        };
        let mut cancel = self.cancel.clone();
        let sent = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => None,
            res = self.events.send(event) => Some(res.is_ok()),
        };
        match sent {
            None => return self.cancel_session().await,
            Some(false) => return self.abandon(),
            Some(true) => {}
        }
        self.transition(SessionState::Complete);
        info!(
            "[{}] Translated {} chars in {:.1}s ({} attempt(s), {} chunks)",
            self.document_id, stats.chars, elapsed_secs, stats.attempts, stats.chunks
        );

        self.dispatch_archive(archived_text);
        self.state
    }

    /// Hand input and output to the archive on a detached task.
    fn dispatch_archive(&self, final_text: String) {
        let Some(archive) = self.archive.clone() else {
            return;
        };
        let document_id = self.document_id.clone();
        let input = self.request.source_shared();
        tokio::spawn(async move {
            match archive.store(&document_id, input, &final_text).await {
                Ok(()) => debug!("[{}] Archived", document_id),
                Err(e) => warn!("[{}] Archival failed: {}", document_id, e),
            }
        });
    }

    async fn fail(mut self, message: String, retries_exhausted: bool) -> SessionState {
        let elapsed_secs = self.elapsed_secs();
        error!(
            "[{}] Translation failed after {:.1}s: {}",
            self.document_id, elapsed_secs, message
        );
        self.transition(SessionState::Failed);
        let event = SessionEvent::Error {
            document_id: self.document_id.clone(),
            message,
            elapsed_secs,
            retries_exhausted,
        };
        self.emit(event).await;
        self.state
    }

    async fn cancel_session(mut self) -> SessionState {
        info!("[{}] Cancelled", self.document_id);
        self.transition(SessionState::Cancelled);
        let event = SessionEvent::Cancelled {
            document_id: self.document_id.clone(),
            elapsed_secs: self.elapsed_secs(),
        };
        self.emit(event).await;
        self.state
    }

    /// Nobody is listening any more; stop without further events.
    fn abandon(mut self) -> SessionState {
        debug!("[{}] Event receiver dropped, abandoning", self.document_id);
        self.transition(SessionState::Cancelled);
        self.state
    }

    fn transition(&mut self, to: SessionState) {
        debug!("[{}] {:?} → {:?}", self.document_id, self.state, to);
        self.state = to;
    }

    /// `false` when the receiver is gone.
    async fn emit(&self, event: SessionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Call the model once and feed its increments through the aggregator,
/// emitting a `Chunk` for each new delta.
///
/// `budget` bounds the time spent waiting on the model. Time blocked on a
/// full event channel extends the deadline, so an accepted delta is always
/// handed to the channel before the attempt can time out.
async fn drive_attempt(
    client: &dyn ModelClient,
    request: &TranslationRequest,
    aggregator: &mut ChunkAggregator,
    events: &mpsc::Sender<SessionEvent>,
    document_id: &str,
    budget: Duration,
) -> AttemptEnd {
    let mut deadline = Instant::now() + budget;
    let timed_out = || {
        AttemptEnd::Failed(ModelError::Timeout {
            secs: budget.as_secs(),
        })
    };

    let output = match timeout_at(deadline, client.invoke(request)).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return AttemptEnd::Failed(e),
        Err(_) => return timed_out(),
    };
    let source_language = output.source_language();
    let mut increments = output.into_increments();

    loop {
        let item = match timeout_at(deadline, increments.next()).await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => return timed_out(),
        };
        let increment = match item {
            Ok(increment) => increment,
            Err(e) => return AttemptEnd::Failed(e),
        };
        let increment = TextIncrement {
            seq: increment.seq,
            text: sanitize::scrub_delta(&increment.text).into_owned(),
        };
        match aggregator.accept(&increment) {
            Ok(Some(delta)) => {
                let event = SessionEvent::Chunk {
                    document_id: document_id.to_string(),
                    delta: delta.text,
                    progress: delta.progress,
                    chunk_count: delta.chunk_index,
                };
                let blocked_since = Instant::now();
                if events.send(event).await.is_err() {
                    return AttemptEnd::ReceiverGone;
                }
                deadline += blocked_since.elapsed();
            }
            Ok(None) => {}
            Err(e) => return AttemptEnd::Failed(e),
        }
    }

    AttemptEnd::Completed { source_language }
}

/// Resolve once the cancel flag is set. Never resolves if the flag's sender
/// is gone without having set it.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
