//! Streaming translation API: admit a request, run it, hand back its events.
//!
//! ## Why stream?
//!
//! Translating a whole contract takes minutes. A stream of events lets
//! callers show text as it arrives, drive a progress bar, and cancel a
//! session that is no longer wanted instead of waiting for a result they
//! will throw away.
//!
//! [`Translator::start_session`] returns a [`SessionHandle`], which is a
//! `Stream` of [`SessionEvent`]s. The session itself runs on its own task;
//! the handle only receives its events and can set its cancel flag.
//! [`Translator::translate`] is the eager wrapper that drains the stream and
//! returns the final output.
//!
//! ## Admission
//!
//! At most `max_concurrent_sessions` sessions run at once. A request that
//! arrives when every slot is taken waits up to `admission_timeout_secs` for
//! one to free up, then fails with [`TranslateError::AtCapacity`]. The slot
//! is held by the session task and released when the session reaches a
//! terminal state, however it got there.

use crate::client::{LlmClient, ModelClient};
use crate::config::TranslatorConfig;
use crate::error::TranslateError;
use crate::event::SessionEvent;
use crate::output::TranslationOutput;
use crate::request::TranslationRequest;
use crate::session::{RetryPolicy, SessionState, StreamSession};
use futures::StreamExt;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Entry point: owns the configuration, the model client and the session
/// slots.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Translator {
    config: TranslatorConfig,
    client: Arc<dyn ModelClient>,
    slots: Arc<Semaphore>,
}

impl Translator {
    /// Build a translator.
    ///
    /// Uses `config.client` when set, otherwise an [`LlmClient`] resolved
    /// from the provider settings.
    ///
    /// # Errors
    /// [`TranslateError::ProviderNotConfigured`] when no client is given and
    /// no LLM provider can be resolved.
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslateError> {
        let client: Arc<dyn ModelClient> = match config.client {
            Some(ref client) => Arc::clone(client),
            None => Arc::new(LlmClient::from_config(&config)?),
        };
        Ok(Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1))),
            config,
            client,
        })
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Sessions currently holding a slot.
    pub fn active_sessions(&self) -> usize {
        self.config.max_concurrent_sessions.max(1) - self.slots.available_permits()
    }

    /// Validate and admit a request, then start translating it.
    ///
    /// The returned handle yields `Start`, then `Chunk`s, then exactly one
    /// of `Final`, `Error` or `Cancelled`.
    ///
    /// # Errors
    /// - [`TranslateError::Validation`]: empty, oversized or non-PDF input.
    ///   No slot is taken and no model call is made.
    /// - [`TranslateError::AtCapacity`]: no slot freed up in time.
    pub async fn start_session(
        &self,
        request: TranslationRequest,
    ) -> Result<SessionHandle, TranslateError> {
        request.validate(self.config.max_input_bytes)?;

        let limit = self.config.max_concurrent_sessions.max(1);
        let wait = Duration::from_secs(self.config.admission_timeout_secs);
        let permit = match tokio::time::timeout(wait, Arc::clone(&self.slots).acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(TranslateError::Internal(
                    "session slots were closed".to_string(),
                ))
            }
            Err(_) => {
                warn!(
                    "Rejecting request: {} sessions active for {}s",
                    limit, self.config.admission_timeout_secs
                );
                return Err(TranslateError::AtCapacity {
                    limit,
                    waited_secs: self.config.admission_timeout_secs,
                });
            }
        };

        let document_id = next_document_id();
        info!(
            "[{}] Admitted: {} bytes → {} via {}",
            document_id,
            request.input_size(),
            request.target(),
            request.model().id()
        );

        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let session = StreamSession::new(
            document_id.clone(),
            request.clone(),
            Arc::clone(&self.client),
            self.config.archive.clone(),
            RetryPolicy::from_config(&self.config),
            self.config.expected_chars_for(request.input_size()),
            events_tx,
            cancel_rx,
        );

        let task = tokio::spawn(async move {
            let state = session.run().await;
            drop(permit);
            state
        });

        Ok(SessionHandle {
            document_id,
            events: ReceiverStream::new(events_rx),
            cancel: CancelHandle(Arc::new(cancel_tx)),
            task: Some(task),
        })
    }

    /// Translate one request and wait for the result.
    ///
    /// # Errors
    /// Everything [`start_session`](Self::start_session) returns, plus
    /// [`TranslateError::SessionFailed`] for an `Error` event.
    pub async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationOutput, TranslateError> {
        let mut handle = self.start_session(request).await?;
        while let Some(event) = handle.next().await {
            match event {
                SessionEvent::Final { .. } => {
                    return event.into_output().ok_or_else(|| {
                        TranslateError::Internal("final event without output".to_string())
                    });
                }
                SessionEvent::Error {
                    document_id,
                    message,
                    elapsed_secs,
                    retries_exhausted,
                } => {
                    return Err(TranslateError::SessionFailed {
                        document_id,
                        message,
                        elapsed_secs,
                        retries_exhausted,
                    });
                }
                SessionEvent::Cancelled { document_id, .. } => {
                    return Err(TranslateError::Cancelled { document_id });
                }
                SessionEvent::Start { .. } | SessionEvent::Chunk { .. } => {}
            }
        }
        Err(TranslateError::Internal(format!(
            "session {} ended without a terminal event",
            handle.document_id()
        )))
    }

}

/// Counter shared by every translator in the process, so translators that
/// share one archive never hand out the same id.
static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(0);

/// `req_<unix seconds>_<pid>_<counter>`.
fn next_document_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let n = NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed);
    format!("req_{secs}_{}_{n}", std::process::id())
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("config", &self.config)
            .field("client", &"<dyn ModelClient>")
            .field("available_slots", &self.slots.available_permits())
            .finish()
    }
}

/// Sets a session's cancel flag. Clone it to cancel from another task.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    /// Ask the session to stop. It emits `Cancelled` and makes no further
    /// model calls. No effect once the session has finished.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// A running session: a `Stream` of its events plus its cancel flag.
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    document_id: String,
    events: ReceiverStream<SessionEvent>,
    cancel: CancelHandle,
    task: Option<JoinHandle<SessionState>>,
}

impl SessionHandle {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn cancel(&self) {
        debug!("[{}] Cancel requested", self.document_id);
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop listening and wait for the session task to finish.
    ///
    /// Events not yet read are discarded; a session still translating sees
    /// its receiver gone at the next event and stops.
    pub async fn join(mut self) -> Result<SessionState, TranslateError> {
        self.events.close();
        let Some(task) = self.task.take() else {
            return Err(TranslateError::Internal("session already joined".to_string()));
        };
        task.await
            .map_err(|e| TranslateError::Internal(format!("session task failed: {e}")))
    }
}

impl Stream for SessionHandle {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("document_id", &self.document_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
