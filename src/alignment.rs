//! Sentence-level alignment of an answer against reference snippets.
//!
//! The classifier call is best-effort by design: the structured-output
//! parse is a fallible boundary with an explicit fallback, never a
//! guaranteed contract. The sentence list itself is computed locally and
//! survives any classifier failure.

use serde::Deserialize;
use tracing::warn;

use crate::gateway::{Attribution, GatewayError, StructuredClassifier};
use crate::prompts;
use crate::relevance::ReferenceResult;
use crate::sentences::split_sentences;

/// Classification of one answer sentence against the reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentStatus {
    Aligned,
    Conflicting,
    Neutral,
}

/// Per-sentence classification of an answer against retrieved references.
///
/// `aligned` and `conflicting` hold indices into `sentences`; everything
/// else is neutral.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SentenceAlignment {
    pub aligned: Vec<usize>,
    pub conflicting: Vec<usize>,
    pub sentences: Vec<String>,
}

impl SentenceAlignment {
    /// One status per sentence, in original sentence order.
    pub fn statuses(&self) -> Vec<AlignmentStatus> {
        (0..self.sentences.len())
            .map(|i| {
                if self.aligned.contains(&i) {
                    AlignmentStatus::Aligned
                } else if self.conflicting.contains(&i) {
                    AlignmentStatus::Conflicting
                } else {
                    AlignmentStatus::Neutral
                }
            })
            .collect()
    }
}

// =============================================================================
// JSON parsing
// =============================================================================

/// Raw JSON structure expected from the classifier.
#[derive(Debug, Deserialize)]
struct ClassificationJson {
    #[serde(default)]
    sentences: Vec<ClassifiedSentenceJson>,
}

#[derive(Debug, Deserialize)]
struct ClassifiedSentenceJson {
    #[serde(default)]
    index: Option<i64>,
    #[serde(default)]
    status: Option<String>,
}

/// Extract a JSON object from a response that may carry surrounding text.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        let mut depth = 0;
        for (i, c) in remainder.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return &remainder[..=i];
                    }
                }
                _ => {}
            }
        }
    }

    trimmed
}

/// Parse the classifier response into (aligned, conflicting) index lists.
///
/// Items with an in-bounds index route by status; neutral, unknown-status
/// and out-of-range items are dropped silently.
fn parse_classification(
    raw: &str,
    sentence_count: usize,
) -> Result<(Vec<usize>, Vec<usize>), String> {
    let parsed: ClassificationJson =
        serde_json::from_str(extract_json(raw)).map_err(|e| e.to_string())?;

    let mut aligned = Vec::new();
    let mut conflicting = Vec::new();

    for item in parsed.sentences {
        let Some(index) = item.index else { continue };
        if index < 0 || index as usize >= sentence_count {
            continue;
        }
        match item.status.as_deref() {
            Some("aligned") => aligned.push(index as usize),
            Some("conflicting") => conflicting.push(index as usize),
            _ => {}
        }
    }

    Ok((aligned, conflicting))
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Classify each sentence of `answer` against `references`.
///
/// Returns the all-empty result without any backend call when there are
/// no references or no sentences. A classifier call or parse failure
/// never propagates: the result then carries empty index lists and the
/// precomputed sentence list.
pub async fn analyze(
    classifier: &dyn StructuredClassifier,
    question: &str,
    answer: &str,
    references: &[ReferenceResult],
    attribution: &Attribution,
) -> SentenceAlignment {
    if references.is_empty() {
        return SentenceAlignment::default();
    }

    let sentences = split_sentences(answer);
    if sentences.is_empty() {
        return SentenceAlignment::default();
    }

    let user_prompt = prompts::alignment_user_prompt(question, &sentences, references);
    let raw = match classifier
        .classify(prompts::ALIGNMENT_SYSTEM_PROMPT, &user_prompt, attribution)
        .await
    {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "Alignment classification call failed; returning sentences only");
            return SentenceAlignment {
                sentences,
                ..Default::default()
            };
        }
    };

    match parse_classification(&raw, sentences.len()) {
        Ok((aligned, conflicting)) => SentenceAlignment {
            aligned,
            conflicting,
            sentences,
        },
        Err(err) => {
            warn!(error = %err, "Failed to parse alignment JSON; returning sentences only");
            SentenceAlignment {
                sentences,
                ..Default::default()
            }
        }
    }
}

// =============================================================================
// FACT-CHECK QUERY FORMATION
// =============================================================================

/// Form one web-search query suitable for fact-checking `answer` against
/// `question`. The search itself belongs to an external collaborator.
pub async fn form_search_query(
    classifier: &dyn StructuredClassifier,
    question: &str,
    answer: &str,
    attribution: &Attribution,
) -> Result<String, GatewayError> {
    let user_prompt = prompts::search_query_user_prompt(question, answer);
    let raw = classifier
        .classify(prompts::SEARCH_QUERY_SYSTEM_PROMPT, &user_prompt, attribution)
        .await?;
    Ok(raw.trim().trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_finds_object_in_surrounding_text() {
        let raw = "Here is my classification:\n{\"sentences\": []}\nDone.";
        assert_eq!(extract_json(raw), "{\"sentences\": []}");
    }

    #[test]
    fn extract_json_handles_nested_objects() {
        let raw = r#"{"sentences": [{"index": 0, "status": "aligned"}]}"#;
        assert_eq!(extract_json(raw), raw);
    }

    #[test]
    fn parse_routes_by_status() {
        let raw = r#"{"sentences": [
            {"index": 0, "status": "aligned"},
            {"index": 1, "status": "conflicting"},
            {"index": 2, "status": "neutral"}
        ]}"#;
        let (aligned, conflicting) = parse_classification(raw, 3).unwrap();
        assert_eq!(aligned, vec![0]);
        assert_eq!(conflicting, vec![1]);
    }

    #[test]
    fn parse_drops_out_of_range_and_malformed_items() {
        let raw = r#"{"sentences": [
            {"index": 7, "status": "aligned"},
            {"index": -1, "status": "aligned"},
            {"status": "conflicting"},
            {"index": 1, "status": "something-else"},
            {"index": 0, "status": "conflicting"}
        ]}"#;
        let (aligned, conflicting) = parse_classification(raw, 2).unwrap();
        assert!(aligned.is_empty());
        assert_eq!(conflicting, vec![0]);
    }

    #[test]
    fn parse_fails_on_non_json() {
        assert!(parse_classification("not json at all", 2).is_err());
    }

    #[test]
    fn statuses_cover_every_sentence_in_order() {
        let alignment = SentenceAlignment {
            aligned: vec![2],
            conflicting: vec![0],
            sentences: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(
            alignment.statuses(),
            vec![
                AlignmentStatus::Conflicting,
                AlignmentStatus::Neutral,
                AlignmentStatus::Aligned,
            ]
        );
    }
}
