//! Sentence splitting for alignment analysis.

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;

// Boundary after . ! ? followed by whitespace; lookbehind needs fancy-regex.
static SENTENCE_SPLIT: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(r"(?<=[.!?])\s+").expect("Invalid sentence split regex")
});

/// Split free text into sentences.
///
/// A sentence ends at a `.`, `!`, or `?` followed by whitespace. Fragments
/// are trimmed and empty fragments dropped, so text with no terminal
/// punctuation still yields one sentence and whitespace-only input yields
/// none.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut last_end = 0;

    let re = &*SENTENCE_SPLIT;
    let mut finder = re.find_iter(text);

    while let Some(Ok(m)) = finder.next() {
        push_trimmed(&mut result, &text[last_end..m.start()]);
        last_end = m.end();
    }

    if last_end < text.len() {
        push_trimmed(&mut result, &text[last_end..]);
    }

    result
}

fn push_trimmed(out: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
