//! Prompt templates for answer elicitation, sentence classification, and
//! fact-check query formation. Backend-agnostic.

use crate::relevance::ReferenceResult;

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// =============================================================================
// ANSWER ELICITATION
// =============================================================================

/// System instruction for answer elicitation. The strict JSON shape is the
/// contract the gateway parses against.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a precise assistant. \
Return ONLY valid JSON: {\"answer\": string, \"self_confidence\": number between 0 and 1}.";

/// Full generation prompt for one answer call.
pub fn answer_prompt(user_prompt: &str) -> String {
    format!("{ANSWER_SYSTEM_PROMPT}\n\nUser: {user_prompt}\nAssistant:")
}

// =============================================================================
// SENTENCE ALIGNMENT CLASSIFICATION
// =============================================================================

pub const ALIGNMENT_SYSTEM_PROMPT: &str = r#"You are a careful fact-checking assistant. You are given a question, a set of reference sources, and the sentences of a candidate answer, each with an index. Label every sentence as "aligned", "conflicting", or "neutral". Use "aligned" strictly only when the sources clearly support the sentence, and "conflicting" strictly only when the sources clearly contradict it; otherwise use "neutral".

Return ONLY valid JSON: {"sentences": [{"index": number, "status": "aligned"|"conflicting"|"neutral"}]} with one entry per sentence.
Example:
{"sentences": [{"index": 0, "status": "aligned"}, {"index": 1, "status": "neutral"}]}"#;

/// Render the user prompt for one classification call: each reference's
/// title and snippet, and each sentence with its index.
pub fn alignment_user_prompt(
    question: &str,
    sentences: &[String],
    references: &[ReferenceResult],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!(
        "<question>\n{}\n</question>",
        escape_xml_chars(question.trim())
    ));

    let refs = references
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "<reference index=\"{i}\">\n<title>{}</title>\n<snippet>{}</snippet>\n</reference>",
                escape_xml_chars(r.title.trim()),
                escape_xml_chars(r.snippet.trim()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    parts.push(format!("<references>\n{refs}\n</references>"));

    let sents = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| format!("<sentence index=\"{i}\">{}</sentence>", escape_xml_chars(s)))
        .collect::<Vec<_>>()
        .join("\n");
    parts.push(format!("<sentences>\n{sents}\n</sentences>"));

    parts.push("Return a JSON object with your classification.\njson:".to_string());
    parts.join("\n\n")
}

// =============================================================================
// FACT-CHECK QUERY FORMATION
// =============================================================================

pub const SEARCH_QUERY_SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes \
a question asked by the user and the response a LLM gave them. From the question and \
response to be provided, form one single search query to find websites allowing the \
user to fact check the response the LLM produced. Respond with only the formed search \
query and nothing else.";

pub fn search_query_user_prompt(question: &str, answer: &str) -> String {
    format!("User's question: {question}. LLM's response: {answer}")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(title: &str, snippet: &str) -> ReferenceResult {
        ReferenceResult {
            url: "https://example.org/a".into(),
            title: title.into(),
            snippet: snippet.into(),
            credibility: 0.9,
            source_domain: None,
            reason: None,
        }
    }

    #[test]
    fn answer_prompt_embeds_user_text() {
        let p = answer_prompt("Who is the CEO of google?");
        assert!(p.starts_with(ANSWER_SYSTEM_PROMPT));
        assert!(p.contains("User: Who is the CEO of google?"));
        assert!(p.ends_with("Assistant:"));
    }

    #[test]
    fn alignment_prompt_indexes_sentences_and_references() {
        let sentences = vec!["Paris is in France.".to_string(), "It is large.".to_string()];
        let refs = vec![reference("Geography", "Paris, capital of France.")];
        let p = alignment_user_prompt("Where is Paris?", &sentences, &refs);
        assert!(p.contains("<reference index=\"0\">"));
        assert!(p.contains("<sentence index=\"1\">It is large.</sentence>"));
        assert!(p.contains("<question>"));
    }

    #[test]
    fn alignment_prompt_escapes_markup() {
        let sentences = vec!["<script>alert(1)</script>".to_string()];
        let refs = vec![reference("t", "s")];
        let p = alignment_user_prompt("q", &sentences, &refs);
        assert!(p.contains("&lt;script&gt;"));
        assert!(!p.contains("<script>"));
    }

    #[test]
    fn search_query_prompt_combines_question_and_answer() {
        let p = search_query_user_prompt("Who won?", "The home team.");
        assert_eq!(p, "User's question: Who won?. LLM's response: The home team.");
    }
}
