//! What each stage sends, and what it does with the reply.

use super::tracker::RequestKind;
use super::StageError;
use crate::llm::{ChatMode, ChatRequest, HistoryEntry};
use crate::parser::{extract_biases, extract_suggested_ideas, extract_summary, parse_model_output};
use crate::session::biases::Bias;
use crate::session::{ChatMessage, Role, Session, SessionError};
use serde::{Deserialize, Serialize};

/// A forced summary with no `<summary>` block is still accepted when the
/// reply is longer than this many characters.
pub const SUMMARY_FALLBACK_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "message", rename_all = "kebab-case")]
pub enum Stage {
    StartConversation,
    SendMessage(String),
    Summarize,
    GenerateIdeas,
    ChallengeBiases,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StageOutcome {
    Replied {
        message: ChatMessage,
        summary: Option<String>,
    },
    Summarized {
        summary: String,
        fallback: bool,
    },
    #[serde(rename_all = "camelCase")]
    IdeasSuggested { added: Vec<String> },
    #[serde(rename_all = "camelCase")]
    BiasesAnalyzed { set_index: usize, biases: Vec<Bias> },
    Cancelled,
}

/// A request ready to send. `user_message` is recorded in the transcript
/// once the request slot is claimed.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub request: ChatRequest,
    pub user_message: Option<String>,
}

impl Stage {
    pub fn kind(&self) -> RequestKind {
        match self {
            Stage::StartConversation | Stage::SendMessage(_) | Stage::Summarize => {
                RequestKind::DefineExperience
            }
            Stage::GenerateIdeas => RequestKind::GenerateIdeas,
            Stage::ChallengeBiases => RequestKind::ChallengeBiases,
        }
    }

    /// Checks preconditions and builds the request without touching the
    /// session.
    pub(crate) fn prepare(&self, session: &Session) -> Result<Prepared, StageError> {
        let experience = session.experience().trim();
        if experience.is_empty() {
            return Err(StageError::NotReady("Please enter an experience first".to_string()));
        }

        let mut history = history_of(session);
        let mut user_message = None;

        let request = match self {
            Stage::StartConversation => {
                if !session.transcript().is_empty() || session.summary().is_some() {
                    return Err(StageError::NotReady("The conversation has already started".to_string()));
                }
                let mut request = ChatRequest::new(ChatMode::DefineExperience, experience, Vec::new());
                request.force_summary = Some(false);
                request
            }
            Stage::SendMessage(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(StageError::NotReady("Message is empty".to_string()));
                }
                history.push(HistoryEntry {
                    role: Role::User,
                    content: text.to_string(),
                });
                user_message = Some(text.to_string());
                let mut request = ChatRequest::new(ChatMode::DefineExperience, experience, history);
                request.force_summary = Some(false);
                request
            }
            Stage::Summarize => {
                if history.is_empty() {
                    return Err(StageError::NotReady(
                        "Please have a conversation first before requesting a summary".to_string(),
                    ));
                }
                let mut request = ChatRequest::new(ChatMode::DefineExperience, experience, history);
                request.force_summary = Some(true);
                request
            }
            Stage::GenerateIdeas => {
                let summary = require_summary(session)?;
                let ideas = session.ideas();
                let mut request = ChatRequest::new(ChatMode::GenerateIdeas, experience, history);
                request.summary = Some(summary);
                request.my_ideas = Some(ideas.my_ideas().to_vec());
                request.all_suggested_ideas = Some(ideas.suggested_ideas().to_vec());
                request.idea_comments = Some(ideas.comments().to_raw());
                request
            }
            Stage::ChallengeBiases => {
                let summary = require_summary(session)?;
                let ideas = session.ideas();
                let annotations = session.annotations();
                let mut request = ChatRequest::new(ChatMode::ChallengeBiases, experience, history);
                request.summary = Some(summary);
                request.my_ideas = Some(ideas.my_ideas().to_vec());
                request.all_suggested_ideas = Some(ideas.suggested_ideas().to_vec());
                request.idea_comments = Some(ideas.comments().to_raw());
                request.bias_comments = Some(annotations.comments().to_raw());
                request.bias_idea_comments = Some(annotations.idea_comments().to_raw());
                request.previous_biases = session.active_biases().map(<[Bias]>::to_vec);
                request
            }
        };

        Ok(Prepared { request, user_message })
    }

    /// Folds a raw reply into the session.
    pub(crate) fn apply(&self, session: &mut Session, raw: &str) -> Result<StageOutcome, StageError> {
        let parsed = parse_model_output(raw);
        let summary = extract_summary(&parsed.structured);

        match self {
            Stage::StartConversation | Stage::SendMessage(_) => {
                let content = parsed.display_text(raw);
                if content.is_empty() {
                    return Err(StageError::EmptyReply);
                }
                let message = session.push_message(Role::Assistant, content);
                if let Some(summary) = &summary {
                    tracing::info!("conversation finished with a summary");
                    session.set_summary(summary.clone());
                }
                Ok(StageOutcome::Replied { message, summary })
            }
            Stage::Summarize => {
                if let Some(summary) = summary {
                    session.set_summary(summary.clone());
                    return Ok(StageOutcome::Summarized {
                        summary,
                        fallback: false,
                    });
                }
                let fallback = parsed.display_text(raw);
                if fallback.chars().count() <= SUMMARY_FALLBACK_MIN_CHARS {
                    tracing::warn!("forced summary produced no usable text");
                    return Err(StageError::NoSummary);
                }
                tracing::warn!("no summary block in forced summary; using reply text");
                session.set_summary(fallback);
                Ok(StageOutcome::Summarized {
                    summary: fallback.to_string(),
                    fallback: true,
                })
            }
            Stage::GenerateIdeas => {
                let suggestions = extract_suggested_ideas(&parsed.structured);
                let added = session.merge_suggested_ideas(&suggestions);
                tracing::info!(returned = suggestions.len(), added = added.len(), "ideas suggested");
                Ok(StageOutcome::IdeasSuggested { added })
            }
            Stage::ChallengeBiases => {
                let biases = session
                    .append_analysis(extract_biases(&parsed.structured))
                    .map_err(|e| match e {
                        SessionError::NoBiases => StageError::NoBiases,
                        other => StageError::Session(other),
                    })?
                    .to_vec();
                Ok(StageOutcome::BiasesAnalyzed {
                    set_index: session.analyses().len() - 1,
                    biases,
                })
            }
        }
    }
}

fn history_of(session: &Session) -> Vec<HistoryEntry> {
    session
        .transcript()
        .iter()
        .map(|message| HistoryEntry {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}

fn require_summary(session: &Session) -> Result<String, StageError> {
    session
        .summary()
        .map(str::to_string)
        .ok_or_else(|| StageError::NotReady("Please complete the experience summary first".to_string()))
}
