use super::biases::BiasDecision;
use super::comments::{CommentMap, NestedComments};
use std::collections::BTreeMap;

/// Everything the user attaches to individual biases, keyed by bias id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiasAnnotations {
    decisions: BTreeMap<String, BiasDecision>,
    user_ideas: BTreeMap<String, Vec<String>>,
    comments: CommentMap,
    idea_comments: NestedComments,
}

impl BiasAnnotations {
    pub fn decision(&self, bias_id: &str) -> Option<BiasDecision> {
        self.decisions.get(bias_id).copied()
    }

    pub fn decisions(&self) -> &BTreeMap<String, BiasDecision> {
        &self.decisions
    }

    /// `None` puts the bias back to undecided.
    pub fn set_decision(&mut self, bias_id: &str, decision: Option<BiasDecision>) -> bool {
        match decision {
            Some(decision) => self.decisions.insert(bias_id.to_string(), decision) != Some(decision),
            None => self.decisions.remove(bias_id).is_some(),
        }
    }

    pub fn user_ideas(&self, bias_id: &str) -> &[String] {
        self.user_ideas.get(bias_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn all_user_ideas(&self) -> &BTreeMap<String, Vec<String>> {
        &self.user_ideas
    }

    pub fn owner_of(&self, idea: &str) -> Option<&str> {
        self.user_ideas
            .iter()
            .find(|(_, ideas)| ideas.iter().any(|i| i == idea))
            .map(|(bias_id, _)| bias_id.as_str())
    }

    pub(crate) fn push_user_idea(&mut self, bias_id: &str, idea: &str) {
        self.user_ideas
            .entry(bias_id.to_string())
            .or_default()
            .push(idea.to_string());
    }

    pub(crate) fn remove_user_idea(&mut self, bias_id: &str, idea: &str) -> bool {
        let Some(ideas) = self.user_ideas.get_mut(bias_id) else {
            return false;
        };
        let before = ideas.len();
        ideas.retain(|i| i != idea);
        let changed = ideas.len() != before;
        if ideas.is_empty() {
            self.user_ideas.remove(bias_id);
        }
        changed
    }

    /// Drops the idea from every bias-scoped list.
    pub(crate) fn forget_user_idea(&mut self, idea: &str) -> bool {
        let owners: Vec<String> = self
            .user_ideas
            .iter()
            .filter(|(_, ideas)| ideas.iter().any(|i| i == idea))
            .map(|(bias_id, _)| bias_id.clone())
            .collect();
        for bias_id in &owners {
            self.remove_user_idea(bias_id, idea);
        }
        !owners.is_empty()
    }

    pub fn comments(&self) -> &CommentMap {
        &self.comments
    }

    pub fn comment(&self, bias_id: &str) -> Option<&str> {
        self.comments.get(bias_id)
    }

    pub fn has_comment(&self, bias_id: &str) -> bool {
        self.comments.has(bias_id)
    }

    pub(crate) fn set_comment(&mut self, bias_id: &str, text: &str) -> bool {
        self.comments.set(bias_id, text)
    }

    pub fn idea_comments(&self) -> &NestedComments {
        &self.idea_comments
    }

    pub fn idea_comment(&self, bias_id: &str, idea: &str) -> Option<&str> {
        self.idea_comments.get(bias_id, idea)
    }

    pub fn has_idea_comment(&self, bias_id: &str, idea: &str) -> bool {
        self.idea_comments.has(bias_id, idea)
    }

    pub(crate) fn set_idea_comment(&mut self, bias_id: &str, idea: &str, text: &str) -> bool {
        self.idea_comments.set(bias_id, idea, text)
    }

    /// Rebuilds annotations from imported data. Bias-scoped ideas are kept
    /// only if they are still active and not already owned by another bias.
    pub(crate) fn restore(
        decisions: BTreeMap<String, Option<BiasDecision>>,
        user_ideas: BTreeMap<String, Vec<String>>,
        comments: CommentMap,
        idea_comments: NestedComments,
        active_ideas: &[String],
    ) -> Self {
        let mut annotations = Self {
            decisions: decisions
                .into_iter()
                .filter_map(|(id, decision)| decision.map(|d| (id, d)))
                .collect(),
            comments,
            idea_comments,
            ..Self::default()
        };
        for (bias_id, ideas) in user_ideas {
            for idea in ideas {
                if !active_ideas.contains(&idea) || annotations.owner_of(&idea).is_some() {
                    tracing::warn!(bias_id = %bias_id, idea = %idea, "dropping stale bias-scoped idea on import");
                    continue;
                }
                annotations.push_user_idea(&bias_id, &idea);
            }
        }
        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_can_be_cleared() {
        let mut notes = BiasAnnotations::default();
        assert!(notes.set_decision("analysis_0_bias_1", Some(BiasDecision::Accepted)));
        assert!(!notes.set_decision("analysis_0_bias_1", Some(BiasDecision::Accepted)));
        assert!(notes.set_decision("analysis_0_bias_1", Some(BiasDecision::Rejected)));
        assert!(notes.set_decision("analysis_0_bias_1", None));
        assert_eq!(notes.decision("analysis_0_bias_1"), None);
    }

    #[test]
    fn empty_idea_lists_are_dropped() {
        let mut notes = BiasAnnotations::default();
        notes.push_user_idea("b1", "Say no more often");
        assert_eq!(notes.owner_of("Say no more often"), Some("b1"));
        assert!(notes.forget_user_idea("Say no more often"));
        assert!(notes.user_ideas("b1").is_empty());
        assert!(notes.all_user_ideas().is_empty());
    }

    #[test]
    fn restore_filters_inactive_and_double_owned_ideas() {
        let user_ideas = BTreeMap::from([
            ("b1".to_string(), vec!["kept".to_string(), "gone".to_string()]),
            ("b2".to_string(), vec!["kept".to_string()]),
        ]);
        let decisions = BTreeMap::from([
            ("b1".to_string(), Some(BiasDecision::Rejected)),
            ("b2".to_string(), None),
        ]);
        let notes = BiasAnnotations::restore(
            decisions,
            user_ideas,
            CommentMap::default(),
            NestedComments::default(),
            &["kept".to_string()],
        );
        assert_eq!(notes.user_ideas("b1"), ["kept"]);
        assert!(notes.user_ideas("b2").is_empty());
        assert_eq!(notes.decisions().len(), 1);
    }
}
