//! Drives the stage round trips: claim a request slot, call the collaborator
//! without holding the session lock, then fold the reply in if the request is
//! still current.

pub mod stages;
pub mod tracker;

use crate::llm::{ChatBackend, LlmError, SpeechBackend};
use crate::session::{Session, SessionError};
use futures::future::Abortable;
use serde::Serialize;
use std::sync::Mutex;

pub use stages::{Stage, StageOutcome};
pub use tracker::{RequestKind, RequestTicket, RequestTracker};

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    NotReady(String),
    #[error(transparent)]
    Transport(#[from] LlmError),
    #[error("Message content is empty")]
    EmptyReply,
    #[error("Unable to generate summary. Please continue the conversation and try again.")]
    NoSummary,
    #[error("No biases were identified. Please try again.")]
    NoBiases,
    #[error("A bias analysis is already running")]
    AnalysisInFlight,
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Serialize for StageError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The session plus the requests running against it.
#[derive(Debug, Default)]
pub struct Workbench {
    pub session: Session,
    pub requests: RequestTracker,
}

impl Workbench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the session. Replies still on the way would land in the fresh
    /// session, so every request is cancelled first.
    pub fn reset(&mut self) {
        self.requests.cancel_all();
        self.session.reset();
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), SessionError> {
        self.session.import_json(json)?;
        self.requests.cancel_all();
        Ok(())
    }
}

/// Runs one stage round trip against `backend`.
///
/// Returns [`StageOutcome::Cancelled`] when a newer request of the same kind
/// superseded this one or it was cancelled; the session is untouched then.
pub async fn run_stage<B: ChatBackend>(
    bench: &Mutex<Workbench>,
    backend: &B,
    stage: Stage,
) -> Result<StageOutcome, StageError> {
    let (ticket, registration, request) = {
        let mut guard = bench.lock().unwrap();
        let prepared = stage.prepare(&guard.session)?;
        let (ticket, registration) = guard.requests.begin(stage.kind())?;
        if let Some(text) = prepared.user_message {
            guard.session.push_message(crate::session::Role::User, text);
        }
        (ticket, registration, prepared.request)
    };
    tracing::info!(kind = ?ticket.kind, mode = ?request.mode, "stage request started");

    let reply = Abortable::new(backend.chat(&request), registration).await;

    let mut guard = bench.lock().unwrap();
    if !guard.requests.complete(ticket) {
        tracing::debug!(kind = ?ticket.kind, "dropping reply of a stale request");
        return Ok(StageOutcome::Cancelled);
    }
    let Ok(reply) = reply else {
        return Ok(StageOutcome::Cancelled);
    };
    let raw = reply.map_err(|e| {
        tracing::warn!(kind = ?ticket.kind, error = %e, "stage request failed");
        StageError::from(e)
    })?;
    stage.apply(&mut guard.session, &raw)
}

/// Transcribes recorded audio. `None` means a newer recording superseded it.
pub async fn transcribe<B: SpeechBackend>(
    bench: &Mutex<Workbench>,
    backend: &B,
    audio: &[u8],
) -> Result<Option<String>, StageError> {
    if audio.is_empty() {
        return Err(StageError::NotReady("No audio was recorded".to_string()));
    }
    let result = run_speech(bench, RequestKind::Transcription, backend.transcribe(audio)).await?;
    match result {
        Some(text) if text.trim().is_empty() => Err(StageError::EmptyReply),
        Some(text) => Ok(Some(text.trim().to_string())),
        None => Ok(None),
    }
}

/// Synthesizes speech for `text`. Starting a new playback request drops the
/// previous one.
pub async fn speak<B: SpeechBackend>(
    bench: &Mutex<Workbench>,
    backend: &B,
    text: &str,
) -> Result<Option<Vec<u8>>, StageError> {
    if text.trim().is_empty() {
        return Err(StageError::NotReady("Text is required".to_string()));
    }
    run_speech(bench, RequestKind::SpeechSynthesis, backend.synthesize(text)).await
}

async fn run_speech<T>(
    bench: &Mutex<Workbench>,
    kind: RequestKind,
    call: impl std::future::Future<Output = Result<T, LlmError>>,
) -> Result<Option<T>, StageError> {
    let (ticket, registration) = bench.lock().unwrap().requests.begin(kind)?;
    let result = Abortable::new(call, registration).await;

    if !bench.lock().unwrap().requests.complete(ticket) {
        return Ok(None);
    }
    match result {
        Ok(value) => Ok(Some(value?)),
        Err(_) => Ok(None),
    }
}
