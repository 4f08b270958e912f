use super::StageError;
use futures::future::{AbortHandle, AbortRegistration};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    DefineExperience,
    GenerateIdeas,
    ChallengeBiases,
    Transcription,
    SpeechSynthesis,
}

/// Proof that a request was started; handed back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub kind: RequestKind,
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    handle: AbortHandle,
}

/// One in-flight slot per request kind.
#[derive(Debug, Default)]
pub struct RequestTracker {
    slots: HashMap<RequestKind, Slot>,
    next_generation: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `kind`, aborting whatever request held it.
    ///
    /// Bias analyses are the exception: appends must land in start order, so a
    /// second analysis is refused while one is running.
    pub fn begin(&mut self, kind: RequestKind) -> Result<(RequestTicket, AbortRegistration), StageError> {
        if let Some(previous) = self.slots.get(&kind) {
            if kind == RequestKind::ChallengeBiases {
                return Err(StageError::AnalysisInFlight);
            }
            previous.handle.abort();
            tracing::debug!(?kind, "superseded in-flight request");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let (handle, registration) = AbortHandle::new_pair();
        self.slots.insert(kind, Slot { generation, handle });
        Ok((RequestTicket { kind, generation }, registration))
    }

    /// Releases the slot if `ticket` still owns it. A `false` return means the
    /// request was superseded or cancelled and its result must be dropped.
    pub fn complete(&mut self, ticket: RequestTicket) -> bool {
        match self.slots.get(&ticket.kind) {
            Some(slot) if slot.generation == ticket.generation => {
                self.slots.remove(&ticket.kind);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, kind: RequestKind) -> bool {
        match self.slots.remove(&kind) {
            Some(slot) => {
                slot.handle.abort();
                tracing::debug!(?kind, "request cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
        }
    }

    pub fn is_in_flight(&self, kind: RequestKind) -> bool {
        self.slots.contains_key(&kind)
    }
}
