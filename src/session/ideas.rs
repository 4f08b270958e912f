use super::comments::CommentMap;
use super::SessionError;
use serde::{Deserialize, Serialize};

/// Where an idea came from, for display only.
///
/// Always derived from pool membership by [`IdeaRegistry::provenance`]; it is
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdeaProvenance {
    ChallengeDerived,
    Suggested,
    UserAuthored,
}

/// The three idea pools plus per-idea notes.
///
/// * `mine`: the user's active list, unique by text.
/// * `suggested`: every idea the model ever suggested (or that was adopted
///   from a bias challenge). Only grows.
/// * `challenge_derived`: ideas adopted from a bias's challenging ideas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaRegistry {
    mine: Vec<String>,
    suggested: Vec<String>,
    challenge_derived: Vec<String>,
    comments: CommentMap,
}

impl IdeaRegistry {
    pub fn my_ideas(&self) -> &[String] {
        &self.mine
    }

    pub fn suggested_ideas(&self) -> &[String] {
        &self.suggested
    }

    pub fn challenge_derived_ideas(&self) -> &[String] {
        &self.challenge_derived
    }

    pub fn comments(&self) -> &CommentMap {
        &self.comments
    }

    pub fn contains(&self, idea: &str) -> bool {
        self.mine.iter().any(|i| i == idea)
    }

    /// Adds to the active list. Blank or already present ideas are ignored.
    pub fn add(&mut self, idea: &str) -> bool {
        let idea = idea.trim();
        if idea.is_empty() || self.contains(idea) {
            return false;
        }
        self.mine.push(idea.to_string());
        true
    }

    /// Removes from the active list only; pools and notes are kept.
    pub fn remove(&mut self, idea: &str) -> bool {
        let before = self.mine.len();
        self.mine.retain(|i| i != idea);
        self.mine.len() != before
    }

    /// Adopts or drops one of a bias's challenging ideas. Returns whether the
    /// idea is active afterwards.
    pub fn toggle_challenging(&mut self, idea: &str) -> bool {
        if self.remove(idea) {
            return false;
        }
        if !self.add(idea) {
            return false;
        }
        let idea = idea.trim();
        push_unique(&mut self.suggested, idea);
        push_unique(&mut self.challenge_derived, idea);
        true
    }

    /// Adds model suggestions that are neither suggested before nor already
    /// active, returning the ones that were new.
    pub fn merge_suggestions(&mut self, ideas: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for idea in ideas {
            let idea = idea.trim();
            if idea.is_empty() || self.contains(idea) || self.suggested.iter().any(|i| i == idea) {
                continue;
            }
            self.suggested.push(idea.to_string());
            added.push(idea.to_string());
        }
        added
    }

    /// Challenge-derived wins over suggested, which wins over user-authored.
    pub fn provenance(&self, idea: &str) -> IdeaProvenance {
        if self.challenge_derived.iter().any(|i| i == idea) {
            IdeaProvenance::ChallengeDerived
        } else if self.suggested.iter().any(|i| i == idea) {
            IdeaProvenance::Suggested
        } else {
            IdeaProvenance::UserAuthored
        }
    }

    pub fn set_comment(&mut self, idea: &str, text: &str) -> bool {
        self.comments.set(idea, text)
    }

    pub fn comment(&self, idea: &str) -> Option<&str> {
        self.comments.get(idea)
    }

    pub fn has_comment(&self, idea: &str) -> bool {
        self.comments.has(idea)
    }

    pub(crate) fn restore(
        mine: Vec<String>,
        suggested: Vec<String>,
        challenge_derived: Vec<String>,
        comments: CommentMap,
    ) -> Result<Self, SessionError> {
        let mut registry = Self {
            comments,
            ..Self::default()
        };
        for idea in mine {
            if idea.trim().is_empty() {
                return Err(SessionError::invalid("myIdeas contains a blank idea"));
            }
            if registry.contains(&idea) {
                return Err(SessionError::invalid(format!(
                    "myIdeas contains '{}' more than once",
                    idea
                )));
            }
            registry.mine.push(idea);
        }
        for idea in &suggested {
            push_unique(&mut registry.suggested, idea);
        }
        for idea in &challenge_derived {
            push_unique(&mut registry.challenge_derived, idea);
        }
        Ok(registry)
    }
}

fn push_unique(pool: &mut Vec<String>, idea: &str) {
    if !pool.iter().any(|i| i == idea) {
        pool.push(idea.to_string());
    }
}
