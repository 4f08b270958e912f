//! Import/export exchange format for a whole session.

use super::annotations::BiasAnnotations;
use super::biases::{AnalysisHistory, Bias, BiasDecision};
use super::comments::{CommentMap, NestedComments};
use super::events::SessionChange;
use super::ideas::IdeaRegistry;
use super::{ChatMessage, Session, SessionData, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A complete, JSON-serializable copy of a session.
///
/// Field names match the saved-session files the web app writes. `biasSets`
/// and `activeBiasSet` carry the full analysis history; snapshots without
/// them import with `biases` as the only set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub experience: String,
    #[serde(rename = "tab1History")]
    pub transcript: Vec<ChatMessage>,
    #[serde(rename = "tab1Summary", default)]
    pub summary: Option<String>,
    pub my_ideas: Vec<String>,
    pub all_suggested_ideas: Vec<String>,
    #[serde(default)]
    pub idea_comments: BTreeMap<String, String>,
    #[serde(rename = "tab3ChallengingIdeas")]
    pub challenge_derived_ideas: Vec<String>,
    #[serde(default)]
    pub biases: Option<Vec<Bias>>,
    pub bias_decisions: BTreeMap<String, Option<BiasDecision>>,
    pub bias_user_ideas: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub bias_comments: BTreeMap<String, String>,
    #[serde(default)]
    pub bias_idea_comments: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bias_sets: Vec<Vec<Bias>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_bias_set: Option<usize>,
}

impl Session {
    pub fn export(&self) -> SessionSnapshot {
        let data = &self.data;
        let ideas = &data.ideas;
        let annotations = &data.annotations;
        SessionSnapshot {
            experience: data.experience.clone(),
            transcript: data.transcript.clone(),
            summary: data.summary.clone(),
            my_ideas: ideas.my_ideas().to_vec(),
            all_suggested_ideas: ideas.suggested_ideas().to_vec(),
            idea_comments: ideas.comments().to_raw(),
            challenge_derived_ideas: ideas.challenge_derived_ideas().to_vec(),
            biases: data.analyses.active().map(<[Bias]>::to_vec),
            bias_decisions: annotations
                .decisions()
                .iter()
                .map(|(id, decision)| (id.clone(), Some(*decision)))
                .collect(),
            bias_user_ideas: annotations.all_user_ideas().clone(),
            bias_comments: annotations.comments().to_raw(),
            bias_idea_comments: annotations.idea_comments().to_raw(),
            bias_sets: data.analyses.sets().to_vec(),
            active_bias_set: data.analyses.active_index(),
        }
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export())
    }

    /// Replaces the whole session with `snapshot`. Nothing changes unless the
    /// snapshot validates completely.
    pub fn import(&mut self, snapshot: SessionSnapshot) -> Result<(), SessionError> {
        let data = restore(snapshot)?;
        tracing::info!(
            messages = data.transcript.len(),
            ideas = data.ideas.my_ideas().len(),
            analyses = data.analyses.len(),
            "session imported"
        );
        self.data = data;
        self.changed(SessionChange::Imported);
        Ok(())
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), SessionError> {
        let snapshot: SessionSnapshot = serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "rejected session snapshot");
            SessionError::invalid(e.to_string())
        })?;
        self.import(snapshot)
    }
}

fn restore(snapshot: SessionSnapshot) -> Result<SessionData, SessionError> {
    let mut ids = HashSet::new();
    for message in &snapshot.transcript {
        if message.id.trim().is_empty() {
            return Err(SessionError::invalid("tab1History has a message without an id"));
        }
        if !ids.insert(message.id.as_str()) {
            return Err(SessionError::invalid(format!(
                "tab1History repeats message id '{}'",
                message.id
            )));
        }
    }

    let ideas = IdeaRegistry::restore(
        snapshot.my_ideas,
        snapshot.all_suggested_ideas,
        snapshot.challenge_derived_ideas,
        CommentMap::from_raw(snapshot.idea_comments),
    )?;

    let biases = snapshot.biases.filter(|set| !set.is_empty());
    let analyses = if snapshot.bias_sets.is_empty() {
        if snapshot.active_bias_set.is_some() {
            return Err(SessionError::invalid("activeBiasSet given without biasSets"));
        }
        AnalysisHistory::restore(biases.into_iter().collect(), None)?
    } else {
        let history = AnalysisHistory::restore(snapshot.bias_sets, snapshot.active_bias_set)?;
        if let Some(biases) = biases {
            if history.active() != Some(biases.as_slice()) {
                return Err(SessionError::invalid("biases does not match the active analysis set"));
            }
        }
        history
    };

    let annotations = BiasAnnotations::restore(
        snapshot.bias_decisions,
        snapshot.bias_user_ideas,
        CommentMap::from_raw(snapshot.bias_comments),
        NestedComments::from_raw(snapshot.bias_idea_comments),
        ideas.my_ideas(),
    );

    Ok(SessionData {
        experience: snapshot.experience,
        transcript: snapshot.transcript,
        finished: snapshot.summary.is_some(),
        summary: snapshot.summary,
        ideas,
        analyses,
        annotations,
    })
}
