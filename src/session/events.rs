use serde::Serialize;
use std::fmt;

/// Which slice of the session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionChange {
    Experience,
    Transcript,
    Summary,
    Ideas,
    IdeaComments,
    Analyses,
    BiasAnnotations,
    Reset,
    Imported,
}

pub type ListenerId = u64;

type Listener = Box<dyn Fn(SessionChange) + Send>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&self, change: SessionChange) {
        for (_, listener) in &self.entries {
            listener(change);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
