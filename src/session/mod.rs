//! The session: single source of truth for all three stages.
//!
//! Every mutation goes through a method on [`Session`]; listeners registered
//! with [`Session::subscribe`] hear about each effective change.

pub mod annotations;
pub mod biases;
pub mod comments;
pub mod events;
pub mod ideas;
pub mod snapshot;

use crate::parser::BiasDescriptor;
use annotations::BiasAnnotations;
use biases::{AnalysisHistory, Bias, BiasDecision};
use events::{ListenerId, Listeners, SessionChange};
use ideas::IdeaRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown bias: {0}")]
    UnknownBias(String),
    #[error("Unknown analysis set: {0}")]
    UnknownAnalysis(usize),
    #[error("No biases were identified")]
    NoBiases,
    #[error("Invalid session snapshot: {0}")]
    InvalidSnapshot(String),
}

impl SessionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SessionError::InvalidSnapshot(message.into())
    }
}

impl Serialize for SessionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionData {
    experience: String,
    transcript: Vec<ChatMessage>,
    summary: Option<String>,
    finished: bool,
    ideas: IdeaRegistry,
    analyses: AnalysisHistory,
    annotations: BiasAnnotations,
}

#[derive(Debug, Default)]
pub struct Session {
    data: SessionData,
    listeners: Listeners,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(SessionChange) + Send + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn changed(&self, change: SessionChange) {
        self.listeners.notify(change);
    }

    // ── Experience ──

    pub fn experience(&self) -> &str {
        &self.data.experience
    }

    pub fn set_experience(&mut self, experience: impl Into<String>) {
        let experience = experience.into();
        if experience != self.data.experience {
            self.data.experience = experience;
            self.changed(SessionChange::Experience);
        }
    }

    // ── Define experience ──

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.data.transcript
    }

    pub fn push_message(&mut self, role: Role, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(role, content);
        self.data.transcript.push(message.clone());
        self.changed(SessionChange::Transcript);
        message
    }

    pub fn summary(&self) -> Option<&str> {
        self.data.summary.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.data.finished
    }

    /// Records the experience summary, which also finishes the first stage.
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.data.summary = Some(summary.into());
        self.data.finished = true;
        self.changed(SessionChange::Summary);
    }

    // ── Ideas ──

    pub fn ideas(&self) -> &IdeaRegistry {
        &self.data.ideas
    }

    pub fn add_idea(&mut self, idea: &str) -> bool {
        let added = self.data.ideas.add(idea);
        if added {
            self.changed(SessionChange::Ideas);
        }
        added
    }

    /// Retracts an idea from the active list and from whichever bias it was
    /// typed under, so bias-scoped lists never outlive the shared list.
    pub fn remove_idea(&mut self, idea: &str) -> bool {
        let removed = self.data.ideas.remove(idea);
        if self.data.annotations.forget_user_idea(idea) {
            self.changed(SessionChange::BiasAnnotations);
        }
        if removed {
            self.changed(SessionChange::Ideas);
        }
        removed
    }

    /// Adopts or drops one of a bias's challenging ideas. Returns whether the
    /// idea is active afterwards.
    pub fn toggle_challenging_idea(&mut self, idea: &str) -> bool {
        let was_active = self.data.ideas.contains(idea);
        let active = self.data.ideas.toggle_challenging(idea);
        if was_active && self.data.annotations.forget_user_idea(idea) {
            self.changed(SessionChange::BiasAnnotations);
        }
        if was_active != active {
            self.changed(SessionChange::Ideas);
        }
        active
    }

    pub fn merge_suggested_ideas(&mut self, ideas: &[String]) -> Vec<String> {
        let added = self.data.ideas.merge_suggestions(ideas);
        if !added.is_empty() {
            self.changed(SessionChange::Ideas);
        }
        added
    }

    pub fn set_idea_comment(&mut self, idea: &str, text: &str) -> bool {
        let changed = self.data.ideas.set_comment(idea, text);
        if changed {
            self.changed(SessionChange::IdeaComments);
        }
        changed
    }

    // ── Bias analyses ──

    pub fn analyses(&self) -> &AnalysisHistory {
        &self.data.analyses
    }

    pub fn active_biases(&self) -> Option<&[Bias]> {
        self.data.analyses.active()
    }

    pub fn append_analysis(&mut self, descriptors: Vec<BiasDescriptor>) -> Result<&[Bias], SessionError> {
        let position = self.data.analyses.append(descriptors)?;
        self.changed(SessionChange::Analyses);
        Ok(&self.data.analyses.sets()[position])
    }

    pub fn select_analysis(&mut self, position: usize) -> Result<&[Bias], SessionError> {
        let previous = self.data.analyses.active_index();
        self.data.analyses.select(position)?;
        if previous != Some(position) {
            self.changed(SessionChange::Analyses);
        }
        Ok(&self.data.analyses.sets()[position])
    }

    // ── Bias annotations ──

    pub fn annotations(&self) -> &BiasAnnotations {
        &self.data.annotations
    }

    fn ensure_bias(&self, bias_id: &str) -> Result<(), SessionError> {
        if self.data.analyses.contains(bias_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownBias(bias_id.to_string()))
        }
    }

    pub fn set_bias_decision(&mut self, bias_id: &str, decision: Option<BiasDecision>) -> Result<(), SessionError> {
        if decision.is_some() {
            self.ensure_bias(bias_id)?;
        }
        if self.data.annotations.set_decision(bias_id, decision) {
            self.changed(SessionChange::BiasAnnotations);
        }
        Ok(())
    }

    /// Adds an idea the user typed under a specific bias. The idea joins both
    /// that bias's list and the active list; it is refused if already active.
    pub fn add_bias_user_idea(&mut self, bias_id: &str, idea: &str) -> Result<bool, SessionError> {
        self.ensure_bias(bias_id)?;
        let idea = idea.trim();
        if idea.is_empty() || self.data.ideas.contains(idea) {
            return Ok(false);
        }
        self.data.ideas.add(idea);
        self.data.annotations.push_user_idea(bias_id, idea);
        self.changed(SessionChange::Ideas);
        self.changed(SessionChange::BiasAnnotations);
        Ok(true)
    }

    pub fn remove_bias_user_idea(&mut self, bias_id: &str, idea: &str) -> bool {
        let scoped = self.data.annotations.remove_user_idea(bias_id, idea);
        let shared = self.data.ideas.remove(idea);
        if scoped {
            self.changed(SessionChange::BiasAnnotations);
        }
        if shared {
            self.changed(SessionChange::Ideas);
        }
        scoped || shared
    }

    pub fn set_bias_comment(&mut self, bias_id: &str, text: &str) -> Result<bool, SessionError> {
        if !text.trim().is_empty() {
            self.ensure_bias(bias_id)?;
        }
        let changed = self.data.annotations.set_comment(bias_id, text);
        if changed {
            self.changed(SessionChange::BiasAnnotations);
        }
        Ok(changed)
    }

    pub fn set_bias_idea_comment(&mut self, bias_id: &str, idea: &str, text: &str) -> Result<bool, SessionError> {
        if !text.trim().is_empty() {
            self.ensure_bias(bias_id)?;
        }
        let changed = self.data.annotations.set_idea_comment(bias_id, idea, text);
        if changed {
            self.changed(SessionChange::BiasAnnotations);
        }
        Ok(changed)
    }

    // ── Lifecycle ──

    /// Clears every stage. The experience text is kept.
    pub fn reset(&mut self) {
        let experience = std::mem::take(&mut self.data.experience);
        self.data = SessionData {
            experience,
            ..SessionData::default()
        };
        tracing::info!("session reset");
        self.changed(SessionChange::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn descriptor(title: &str, ideas: &[&str]) -> BiasDescriptor {
        BiasDescriptor {
            id: "bias_1".to_string(),
            title: title.to_string(),
            explanation: "because".to_string(),
            challenging_ideas: ideas.iter().map(|i| i.to_string()).collect(),
        }
    }

    fn analysed_session() -> (Session, String) {
        let mut session = Session::new();
        session.set_experience("A rough first week at a new job");
        let id = session
            .append_analysis(vec![descriptor("Negativity bias", &["List three wins"])])
            .unwrap()[0]
            .id
            .clone();
        (session, id)
    }

    #[test]
    fn summary_finishes_the_first_stage() {
        let mut session = Session::new();
        assert!(!session.is_finished());
        session.set_summary("It went badly");
        assert!(session.is_finished());
        assert_eq!(session.summary(), Some("It went badly"));
    }

    #[test]
    fn message_ids_are_distinct() {
        let mut session = Session::new();
        let a = session.push_message(Role::User, "hi");
        let b = session.push_message(Role::Assistant, "hello");
        assert_ne!(a.id, b.id);
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn bias_scoped_idea_lives_in_both_lists() {
        let (mut session, id) = analysed_session();
        assert!(session.add_bias_user_idea(&id, "Ask my manager").unwrap());
        assert!(!session.add_bias_user_idea(&id, "Ask my manager").unwrap());
        assert_eq!(session.ideas().my_ideas(), ["Ask my manager"]);
        assert_eq!(session.annotations().user_ideas(&id), ["Ask my manager"]);

        assert!(session.remove_bias_user_idea(&id, "Ask my manager"));
        assert!(session.ideas().my_ideas().is_empty());
        assert!(session.annotations().user_ideas(&id).is_empty());
    }

    #[test]
    fn shared_removal_also_clears_bias_list() {
        let (mut session, id) = analysed_session();
        session.add_bias_user_idea(&id, "Ask my manager").unwrap();
        assert!(session.remove_idea("Ask my manager"));
        assert!(session.annotations().owner_of("Ask my manager").is_none());
    }

    #[test]
    fn unknown_bias_is_refused() {
        let mut session = Session::new();
        assert!(matches!(
            session.set_bias_decision("analysis_9_bias_1", Some(BiasDecision::Accepted)),
            Err(SessionError::UnknownBias(_))
        ));
        assert!(session.add_bias_user_idea("nope", "x").is_err());
        // clearing is always allowed
        assert!(session.set_bias_comment("nope", "").is_ok());
    }

    #[test]
    fn annotations_are_scoped_per_analysis() {
        let (mut session, first) = analysed_session();
        session
            .set_bias_decision(&first, Some(BiasDecision::Rejected))
            .unwrap();
        session.set_bias_idea_comment(&first, "List three wins", "hard").unwrap();

        let second = session
            .append_analysis(vec![descriptor("Negativity bias", &["List three wins"])])
            .unwrap()[0]
            .id
            .clone();
        assert_ne!(first, second);
        assert_eq!(session.annotations().decision(&second), None);
        assert!(!session.annotations().has_idea_comment(&second, "List three wins"));
        assert_eq!(session.annotations().decision(&first), Some(BiasDecision::Rejected));
    }

    #[test]
    fn reset_keeps_experience_only() {
        let (mut session, id) = analysed_session();
        session.push_message(Role::User, "hello");
        session.set_summary("summary");
        session.toggle_challenging_idea("List three wins");
        session.set_bias_comment(&id, "fair").unwrap();

        session.reset();
        assert_eq!(session.experience(), "A rough first week at a new job");
        assert!(session.transcript().is_empty());
        assert_eq!(session.summary(), None);
        assert!(!session.is_finished());
        assert!(session.ideas().suggested_ideas().is_empty());
        assert!(session.analyses().is_empty());
        assert!(!session.annotations().has_comment(&id));
    }

    #[test]
    fn listeners_hear_effective_changes_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new();
        let sink = Arc::clone(&seen);
        let id = session.subscribe(move |change| sink.lock().unwrap().push(change));

        session.add_idea("Stretch");
        session.add_idea("Stretch");
        session.set_idea_comment("Stretch", "   ");
        session.reset();
        assert!(session.unsubscribe(id));
        session.add_idea("Unheard");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionChange::Ideas, SessionChange::Reset]
        );
    }
}
