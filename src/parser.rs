//! Decoding of structured blocks embedded in model replies.
//!
//! A reply is ordinary prose interleaved with machine-readable blocks:
//! `<summary>…</summary>`, `<ideas>…</ideas>` (or `<suggested_ideas>`),
//! `<biases>…</biases>` and fenced JSON code blocks. Every block that decodes
//! into one of the known shapes is lifted into [`StructuredPayload`] and cut
//! out of the prose; anything else stays in the prose untouched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)<summary>(?P<summary>.*?)</summary>",
        r"|<(?:suggested_ideas|ideas)>(?P<ideas>.*?)</(?:suggested_ideas|ideas)>",
        r"|<biases>(?P<biases>.*?)</biases>",
        r"|```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(?P<fenced>.*?)```",
    ))
    .unwrap()
});

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").unwrap());

const IDEA_KEYS: &[&str] = &["suggestedIdeas", "suggested_ideas", "ideas"];
const IDEA_TEXT_KEYS: &[&str] = &["text", "idea", "title"];

/// One bias as the model described it.
///
/// `id` is only positional (`bias_1`, `bias_2`, …) unless the model supplied
/// one; it is never unique across analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasDescriptor {
    pub id: String,
    pub title: String,
    pub explanation: String,
    pub challenging_ideas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_ideas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biases: Option<Vec<BiasDescriptor>>,
}

impl StructuredPayload {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.suggested_ideas.is_none() && self.biases.is_none()
    }

    fn absorb(&mut self, block: StructuredBlock) {
        match block {
            StructuredBlock::Summary(summary) => self.summary = Some(summary),
            StructuredBlock::SuggestedIdeas(ideas) => {
                let pool = self.suggested_ideas.get_or_insert_with(Vec::new);
                for idea in ideas {
                    if !pool.contains(&idea) {
                        pool.push(idea);
                    }
                }
            }
            StructuredBlock::Biases(biases) => {
                let pool = self.biases.get_or_insert_with(Vec::new);
                for mut bias in biases {
                    if bias.id.is_empty() {
                        bias.id = format!("bias_{}", pool.len() + 1);
                    }
                    pool.push(bias);
                }
            }
        }
    }
}

/// The closed set of shapes a block can decode into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredBlock {
    Summary(String),
    SuggestedIdeas(Vec<String>),
    Biases(Vec<BiasDescriptor>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOutput {
    pub structured: StructuredPayload,
    pub clean_text: String,
}

impl ParsedOutput {
    /// Text to show the user: the clean prose, or the trimmed raw reply when
    /// nothing but structured blocks was returned.
    pub fn display_text<'a>(&'a self, raw: &'a str) -> &'a str {
        if self.clean_text.is_empty() {
            raw.trim()
        } else {
            &self.clean_text
        }
    }
}

/// Splits a raw model reply into structured fields and clean prose.
///
/// Never fails: blocks that cannot be decoded are kept as prose and simply
/// contribute nothing to `structured`.
pub fn parse_model_output(raw: &str) -> ParsedOutput {
    let mut structured = StructuredPayload::default();
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in BLOCK_PATTERN.captures_iter(raw) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(blocks) = decode_captures(&captures) else {
            continue;
        };
        segments.push(&raw[cursor..whole.start()]);
        cursor = whole.end();
        for block in blocks {
            structured.absorb(block);
        }
    }

    if segments.is_empty() {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            let blocks = decode_json_blocks(trimmed);
            if !blocks.is_empty() {
                for block in blocks {
                    structured.absorb(block);
                }
                return ParsedOutput {
                    structured,
                    clean_text: String::new(),
                };
            }
        }
    }

    segments.push(&raw[cursor..]);
    let clean_text = join_prose(&segments);

    tracing::debug!(
        summary = structured.summary.is_some(),
        ideas = structured.suggested_ideas.as_ref().map_or(0, Vec::len),
        biases = structured.biases.as_ref().map_or(0, Vec::len),
        "parsed model output"
    );

    ParsedOutput {
        structured,
        clean_text,
    }
}

pub fn extract_summary(payload: &StructuredPayload) -> Option<String> {
    payload.summary.clone()
}

pub fn extract_suggested_ideas(payload: &StructuredPayload) -> Vec<String> {
    payload.suggested_ideas.clone().unwrap_or_default()
}

pub fn extract_biases(payload: &StructuredPayload) -> Vec<BiasDescriptor> {
    payload.biases.clone().unwrap_or_default()
}

fn decode_captures(captures: &Captures<'_>) -> Option<Vec<StructuredBlock>> {
    if let Some(body) = captures.name("summary") {
        return decode_summary(body.as_str()).map(|summary| vec![StructuredBlock::Summary(summary)]);
    }
    if let Some(body) = captures.name("ideas") {
        return decode_ideas(body.as_str()).map(|ideas| vec![StructuredBlock::SuggestedIdeas(ideas)]);
    }
    if let Some(body) = captures.name("biases") {
        return decode_biases(body.as_str()).map(|biases| vec![StructuredBlock::Biases(biases)]);
    }
    if let Some(body) = captures.name("fenced") {
        let blocks = decode_json_blocks(body.as_str());
        return (!blocks.is_empty()).then_some(blocks);
    }
    None
}

fn decode_summary(body: &str) -> Option<String> {
    let body = body.trim();
    let summary = if body.starts_with('"') {
        serde_json::from_str::<String>(body).ok()?
    } else if body.starts_with('{') {
        let value: Value = serde_json::from_str(body).ok()?;
        value.get("summary")?.as_str()?.to_string()
    } else {
        body.to_string()
    };
    let summary = summary.trim();
    (!summary.is_empty()).then(|| summary.to_string())
}

fn decode_ideas(body: &str) -> Option<Vec<String>> {
    let body = body.trim();
    let ideas = if body.starts_with('[') || body.starts_with('{') {
        let value: Value = serde_json::from_str(body).ok()?;
        ideas_from_value(&value)
    } else {
        dedup(
            body.lines()
                .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
                .filter(|line| !line.is_empty()),
        )
    };
    (!ideas.is_empty()).then_some(ideas)
}

fn decode_biases(body: &str) -> Option<Vec<BiasDescriptor>> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    let biases = biases_from_value(&value);
    (!biases.is_empty()).then_some(biases)
}

fn decode_json_blocks(body: &str) -> Vec<StructuredBlock> {
    let Ok(value) = serde_json::from_str::<Value>(body.trim()) else {
        return Vec::new();
    };
    let mut blocks = Vec::new();
    match &value {
        Value::Object(map) => {
            if let Some(summary) = map.get("summary").and_then(Value::as_str) {
                let summary = summary.trim();
                if !summary.is_empty() {
                    blocks.push(StructuredBlock::Summary(summary.to_string()));
                }
            }
            let ideas = ideas_from_value(&value);
            if !ideas.is_empty() {
                blocks.push(StructuredBlock::SuggestedIdeas(ideas));
            }
            if let Some(biases) = map.get("biases") {
                let biases = biases_from_value(biases);
                if !biases.is_empty() {
                    blocks.push(StructuredBlock::Biases(biases));
                }
            }
        }
        Value::Array(_) => {
            let biases = biases_from_value(&value);
            if !biases.is_empty() {
                blocks.push(StructuredBlock::Biases(biases));
            } else {
                let ideas = ideas_from_value(&value);
                if !ideas.is_empty() {
                    blocks.push(StructuredBlock::SuggestedIdeas(ideas));
                }
            }
        }
        _ => {}
    }
    blocks
}

fn ideas_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => dedup(items.iter().filter_map(idea_text)),
        Value::Object(map) => IDEA_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| v.is_array()))
            .map(ideas_from_value)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn idea_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.as_str(),
        Value::Object(map) => IDEA_TEXT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

const EXPLANATION_KEYS: &[&str] = &["explanation", "description"];
const CHALLENGE_KEYS: &[&str] = &["challengingIdeas", "challenging_ideas", "ideas"];

/// Reads one bias object. Keys are looked up by precedence, so a reply that
/// carries both a key and its alias still decodes.
fn bias_from_value(value: &Value) -> Option<BiasDescriptor> {
    let map = value.as_object()?;
    let title = map.get("title")?.as_str()?.trim().to_string();
    if title.is_empty() {
        return None;
    }
    let id = match map.get("id") {
        Some(Value::String(id)) => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    let explanation = EXPLANATION_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string();
    let challenging_ideas = CHALLENGE_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
        .map(|items| dedup(items.iter().filter_map(idea_text)))
        .unwrap_or_default();
    Some(BiasDescriptor {
        id,
        title,
        explanation,
        challenging_ideas,
    })
}

fn biases_from_value(value: &Value) -> Vec<BiasDescriptor> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(bias_from_value)
            .collect(),
        Value::Object(map) => map.get("biases").map(biases_from_value).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Joins the prose left between removed blocks. A gap that touched a line
/// break becomes a paragraph break, an inline gap becomes one space.
fn join_prose(segments: &[&str]) -> String {
    let mut out = String::new();
    let mut break_pending = false;
    for segment in segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            break_pending |= segment.contains('\n');
            continue;
        }
        let leading = &segment[..segment.len() - segment.trim_start().len()];
        if !out.is_empty() {
            out.push_str(if break_pending || leading.contains('\n') {
                "\n\n"
            } else {
                " "
            });
        }
        out.push_str(trimmed);
        break_pending = segment[segment.trim_end().len()..].contains('\n');
    }
    out
}
