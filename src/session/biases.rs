use super::SessionError;
use crate::parser::BiasDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ID_PREFIX: &str = "analysis_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bias {
    pub id: String,
    pub title: String,
    pub explanation: String,
    pub challenging_ideas: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasDecision {
    Accepted,
    Rejected,
}

/// Every bias analysis the session has produced, oldest first.
///
/// Sets are only ever appended. Ids are stamped `analysis_<n>_<source id>`
/// from a counter that never goes backwards, so state keyed by bias id can
/// not collide between analyses. `active` is the set currently on display and
/// moves independently of the append order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisHistory {
    sets: Vec<Vec<Bias>>,
    active: Option<usize>,
    next_index: usize,
}

impl AnalysisHistory {
    pub fn sets(&self) -> &[Vec<Bias>] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&[Bias]> {
        self.active.map(|i| self.sets[i].as_slice())
    }

    pub fn find(&self, id: &str) -> Option<&Bias> {
        self.sets.iter().flatten().find(|bias| bias.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Stamps and appends one analysis, making it the active set. Returns the
    /// position of the new set.
    pub fn append(&mut self, descriptors: Vec<BiasDescriptor>) -> Result<usize, SessionError> {
        if descriptors.is_empty() {
            return Err(SessionError::NoBiases);
        }

        let set_index = self.next_index;
        let mut used = HashSet::new();
        let biases: Vec<Bias> = descriptors
            .into_iter()
            .enumerate()
            .map(|(position, descriptor)| {
                let fallback = format!("bias_{}", position + 1);
                let mut source = if descriptor.id.trim().is_empty() {
                    fallback.clone()
                } else {
                    descriptor.id.trim().to_string()
                };
                if used.contains(&source) {
                    source = format!("{}_{}", source, position + 1);
                }
                while used.contains(&source) {
                    source.push('_');
                }
                used.insert(source.clone());
                Bias {
                    id: format!("{}{}_{}", ID_PREFIX, set_index, source),
                    title: descriptor.title,
                    explanation: descriptor.explanation,
                    challenging_ideas: descriptor.challenging_ideas,
                }
            })
            .collect();

        tracing::info!(set_index, biases = biases.len(), "appended bias analysis");

        self.sets.push(biases);
        self.next_index += 1;
        let position = self.sets.len() - 1;
        self.active = Some(position);
        Ok(position)
    }

    /// Makes an earlier (or later) set the one on display. Ids are untouched.
    pub fn select(&mut self, position: usize) -> Result<&[Bias], SessionError> {
        if position >= self.sets.len() {
            return Err(SessionError::UnknownAnalysis(position));
        }
        self.active = Some(position);
        Ok(&self.sets[position])
    }

    pub(crate) fn restore(sets: Vec<Vec<Bias>>, active: Option<usize>) -> Result<Self, SessionError> {
        if let Some(position) = active {
            if position >= sets.len() {
                return Err(SessionError::invalid(format!(
                    "activeBiasSet {} is out of range for {} analysis sets",
                    position,
                    sets.len()
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut next_index = sets.len();
        for bias in sets.iter().flatten() {
            if bias.id.trim().is_empty() {
                return Err(SessionError::invalid("bias with an empty id"));
            }
            if !seen.insert(bias.id.as_str()) {
                return Err(SessionError::invalid(format!(
                    "bias id '{}' appears more than once",
                    bias.id
                )));
            }
            if let Some(index) = analysis_set_index(&bias.id) {
                let after = index.checked_add(1).ok_or_else(|| {
                    SessionError::invalid(format!("bias id '{}' has an out of range set index", bias.id))
                })?;
                next_index = next_index.max(after);
            }
        }
        if sets.iter().any(Vec::is_empty) {
            return Err(SessionError::invalid("empty analysis set"));
        }

        Ok(Self {
            active: active.or_else(|| sets.len().checked_sub(1)),
            sets,
            next_index,
        })
    }
}

/// The analysis counter value a stamped bias id was created with.
pub fn analysis_set_index(id: &str) -> Option<usize> {
    let rest = id.strip_prefix(ID_PREFIX)?;
    let (index, source) = rest.split_once('_')?;
    if source.is_empty() {
        return None;
    }
    index.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, title: &str) -> BiasDescriptor {
        BiasDescriptor {
            id: id.to_string(),
            title: title.to_string(),
            explanation: String::new(),
            challenging_ideas: vec!["Try X".to_string()],
        }
    }

    #[test]
    fn repeated_source_ids_never_collide() {
        let mut history = AnalysisHistory::default();
        history.append(vec![descriptor("bias_1", "Anchoring")]).unwrap();
        history.append(vec![descriptor("bias_1", "Anchoring again")]).unwrap();

        assert_eq!(history.sets()[0][0].id, "analysis_0_bias_1");
        assert_eq!(history.sets()[1][0].id, "analysis_1_bias_1");
        assert_eq!(history.active_index(), Some(1));
    }

    #[test]
    fn ids_are_unique_and_traceable() {
        let mut history = AnalysisHistory::default();
        let sizes = [3, 1, 4];
        for size in sizes {
            let batch = (0..size).map(|i| descriptor(&format!("bias_{}", i + 1), "t")).collect();
            history.append(batch).unwrap();
        }

        let ids: HashSet<&str> = history.sets().iter().flatten().map(|b| b.id.as_str()).collect();
        assert_eq!(ids.len(), sizes.iter().sum::<usize>());
        for (position, set) in history.sets().iter().enumerate() {
            for bias in set {
                assert_eq!(analysis_set_index(&bias.id), Some(position));
            }
        }
    }

    #[test]
    fn duplicate_ids_inside_one_answer_are_split() {
        let mut history = AnalysisHistory::default();
        history
            .append(vec![descriptor("x", "a"), descriptor("x", "b"), descriptor("", "c")])
            .unwrap();
        let ids: Vec<_> = history.sets()[0].iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["analysis_0_x", "analysis_0_x_2", "analysis_0_bias_3"]);
    }

    #[test]
    fn empty_analysis_is_rejected() {
        let mut history = AnalysisHistory::default();
        assert!(matches!(history.append(Vec::new()), Err(SessionError::NoBiases)));
        assert!(history.is_empty());

        history.append(vec![descriptor("bias_1", "a")]).unwrap();
        // a rejected analysis does not consume a set index
        assert!(history.append(Vec::new()).is_err());
        history.append(vec![descriptor("bias_1", "b")]).unwrap();
        assert_eq!(history.sets()[1][0].id, "analysis_1_bias_1");
    }

    #[test]
    fn selecting_keeps_ids() {
        let mut history = AnalysisHistory::default();
        history.append(vec![descriptor("bias_1", "old")]).unwrap();
        history.append(vec![descriptor("bias_1", "new")]).unwrap();

        let selected = history.select(0).unwrap();
        assert_eq!(selected[0].id, "analysis_0_bias_1");
        assert_eq!(history.active().unwrap()[0].title, "old");
        assert_eq!(history.len(), 2);
        assert!(matches!(history.select(2), Err(SessionError::UnknownAnalysis(2))));
    }

    #[test]
    fn restore_resumes_counter_past_imported_ids() {
        let imported = vec![Bias {
            id: "analysis_4_bias_1".to_string(),
            title: "t".to_string(),
            explanation: String::new(),
            challenging_ideas: Vec::new(),
        }];
        let mut history = AnalysisHistory::restore(vec![imported], None).unwrap();
        assert_eq!(history.active_index(), Some(0));

        history.append(vec![descriptor("bias_1", "next")]).unwrap();
        assert_eq!(history.sets()[1][0].id, "analysis_5_bias_1");
    }

    #[test]
    fn restore_rejects_colliding_ids() {
        let bias = Bias {
            id: "analysis_0_bias_1".to_string(),
            title: "t".to_string(),
            explanation: String::new(),
            challenging_ideas: Vec::new(),
        };
        let result = AnalysisHistory::restore(vec![vec![bias.clone()], vec![bias]], Some(0));
        assert!(matches!(result, Err(SessionError::InvalidSnapshot(_))));
    }

    #[test]
    fn restore_rejects_set_index_at_the_limit() {
        let bias = Bias {
            id: format!("analysis_{}_bias_1", usize::MAX),
            title: "t".to_string(),
            explanation: String::new(),
            challenging_ideas: Vec::new(),
        };
        let result = AnalysisHistory::restore(vec![vec![bias]], None);
        assert!(matches!(result, Err(SessionError::InvalidSnapshot(_))));
    }
}
