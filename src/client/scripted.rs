//! A deterministic [`ModelClient`] that replays scripted attempts.
//!
//! Each call to `invoke` pops the next [`Script`]; once the queue is empty the
//! optional fallback script is replayed for every further call. This makes the
//! failure modes a session must survive reproducible:
//!
//! ```rust
//! use edgequake_translate::client::{Script, ScriptedClient};
//! use edgequake_translate::ModelError;
//!
//! // First attempt dies after two increments, the retry succeeds.
//! let client = ScriptedClient::new()
//!     .then(Script::increments(["The loan", " ag"]).then_fail(ModelError::Transport("reset".into())))
//!     .then(Script::increments(["The loan agreement"]));
//! ```

use super::{ModelClient, ModelOutput, TextIncrement};
use crate::error::ModelError;
use crate::language::Language;
use crate::request::TranslationRequest;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One step of a streamed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Yield an increment with an explicit sequence number.
    Increment { seq: u64, text: String },
    /// Yield an error; the session abandons the attempt.
    Fail(ModelError),
    /// Wait before the next step.
    Sleep(Duration),
    /// Never yield again.
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Steps(Vec<Step>),
    Full(String),
    InvokeError(ModelError),
}

/// The behaviour of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    body: Body,
    source_language: Option<Language>,
}

impl Script {
    /// Stream the parts as increments numbered 0, 1, 2, …
    pub fn increments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = parts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Step::Increment {
                seq: i as u64,
                text: text.into(),
            })
            .collect();
        Self::steps(steps)
    }

    pub fn steps(steps: Vec<Step>) -> Self {
        Self {
            body: Body::Steps(steps),
            source_language: None,
        }
    }

    /// Answer with a single full result.
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            body: Body::Full(text.into()),
            source_language: None,
        }
    }

    /// Fail the call itself, before any output.
    pub fn invoke_error(error: ModelError) -> Self {
        Self {
            body: Body::InvokeError(error),
            source_language: None,
        }
    }

    /// A stream that never yields.
    pub fn hang() -> Self {
        Self::steps(vec![Step::Hang])
    }

    /// Append a failure after the scripted increments.
    pub fn then_fail(self, error: ModelError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Stop yielding after the scripted increments.
    pub fn then_hang(self) -> Self {
        self.push(Step::Hang)
    }

    /// Sleep `delay` before every increment.
    pub fn paced(mut self, delay: Duration) -> Self {
        if let Body::Steps(steps) = &mut self.body {
            *steps = steps
                .drain(..)
                .flat_map(|step| match step {
                    Step::Increment { .. } => vec![Step::Sleep(delay), step],
                    other => vec![other],
                })
                .collect();
        }
        self
    }

    pub fn with_source_language(mut self, language: Language) -> Self {
        self.source_language = Some(language);
        self
    }

    fn push(mut self, step: Step) -> Self {
        match &mut self.body {
            Body::Steps(steps) => steps.push(step),
            Body::Full(text) => {
                let text = std::mem::take(text);
                self.body = Body::Steps(vec![Step::Increment { seq: 0, text }, step]);
            }
            Body::InvokeError(_) => {}
        }
        self
    }

    fn into_output(self) -> Result<ModelOutput, ModelError> {
        let source_language = self.source_language;
        match self.body {
            Body::InvokeError(e) => Err(e),
            Body::Full(text) => Ok(ModelOutput::Full {
                text,
                source_language,
            }),
            Body::Steps(steps) => {
                let increments = stream::iter(steps).filter_map(|step| async move {
                    match step {
                        Step::Increment { seq, text } => Some(Ok(TextIncrement { seq, text })),
                        Step::Fail(e) => Some(Err(e)),
                        Step::Sleep(d) => {
                            tokio::time::sleep(d).await;
                            None
                        }
                        Step::Hang => {
                            futures::future::pending::<()>().await;
                            None
                        }
                    }
                });
                Ok(ModelOutput::Stream {
                    increments: Box::pin(increments),
                    source_language,
                })
            }
        }
    }
}

/// Replays [`Script`]s, one per `invoke`.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    queue: Mutex<VecDeque<Script>>,
    fallback: Option<Script>,
    invocations: AtomicU32,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the script for the next unscripted attempt.
    pub fn then(self, script: Script) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(script);
        self
    }

    /// Replay `script` for every attempt once the queue is empty.
    pub fn otherwise(mut self, script: Script) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Number of `invoke` calls so far.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> Option<Script> {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queue.pop_front().or_else(|| self.fallback.clone())
    }
}

impl ModelClient for ScriptedClient {
    fn invoke<'a>(
        &'a self,
        _request: &'a TranslationRequest,
    ) -> BoxFuture<'a, Result<ModelOutput, ModelError>> {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        let script = self.next_script();
        Box::pin(async move {
            match script {
                Some(script) => script.into_output(),
                None => Err(ModelError::Rejected(format!(
                    "no script for attempt {n}"
                ))),
            }
        })
    }
}
