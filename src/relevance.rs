//! Filtering and deduplication of retrieved reference results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

/// One retrieved reference result. Produced by an external search
/// collaborator; never mutated here, only included or excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Pre-assigned credibility in [0, 1].
    pub credibility: f64,
    /// Explicit domain override; when absent the URL host is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    /// Free-text rationale from the retriever, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Knobs for one filtering pass.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Minimum credibility; the threshold is inclusive, equal keeps.
    pub min_credibility: f64,
    /// Domains to drop, matched exactly or as a dot-boundary suffix.
    pub blocked_domains: HashSet<String>,
    /// Domains kept unconditionally. The allowlist overrides the
    /// credibility and required-terms checks AND the blocklist.
    pub allow_domains: HashSet<String>,
    /// Case-insensitive terms; at least one must appear in title+snippet.
    /// Empty means no term check.
    pub required_terms: HashSet<String>,
    /// Drop repeat URLs, keeping the first occurrence.
    pub dedupe: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_credibility: 0.6,
            blocked_domains: HashSet::from(["example-spam.com".to_string()]),
            allow_domains: HashSet::new(),
            required_terms: HashSet::new(),
            dedupe: true,
        }
    }
}

/// Host portion of a URL, lower-cased; empty when the URL does not parse.
fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// Exact match, or a proper suffix match on a dot boundary
/// ("a.b.spam.com" matches "spam.com" but "notspam.com" does not).
fn domain_in(domain: &str, set: &HashSet<String>) -> bool {
    set.iter()
        .any(|d| domain == d || domain.ends_with(&format!(".{d}")))
}

/// Filter reference results in a single left-to-right pass, preserving
/// input order among kept items.
///
/// Per-item decision, in precedence order: duplicate URL (when `dedupe`)
/// drops; an allowlisted domain keeps unconditionally, even when the same
/// domain is blocklisted; a blocklisted domain drops; credibility below
/// the minimum drops (equal keeps); when required terms are set, an item
/// whose title+snippet contains none of them drops; everything else keeps.
pub fn filter_results(
    results: impl IntoIterator<Item = ReferenceResult>,
    opts: &FilterOptions,
) -> Vec<ReferenceResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<ReferenceResult> = Vec::new();

    for r in results {
        let domain = r
            .source_domain
            .clone()
            .unwrap_or_else(|| host_of(&r.url));

        if opts.dedupe && seen.contains(&r.url) {
            continue;
        }

        if domain_in(&domain, &opts.allow_domains) {
            seen.insert(r.url.clone());
            kept.push(r);
            continue;
        }

        if domain_in(&domain, &opts.blocked_domains) {
            continue;
        }

        if r.credibility < opts.min_credibility {
            continue;
        }

        if !opts.required_terms.is_empty() {
            let text = format!("{} {}", r.title, r.snippet).to_lowercase();
            if !opts
                .required_terms
                .iter()
                .any(|term| text.contains(&term.to_lowercase()))
            {
                continue;
            }
        }

        seen.insert(r.url.clone());
        kept.push(r);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, credibility: f64) -> ReferenceResult {
        ReferenceResult {
            url: url.into(),
            title: "A title".into(),
            snippet: "A snippet".into(),
            credibility,
            source_domain: None,
            reason: None,
        }
    }

    fn opts() -> FilterOptions {
        FilterOptions {
            min_credibility: 0.6,
            blocked_domains: HashSet::new(),
            allow_domains: HashSet::new(),
            required_terms: HashSet::new(),
            dedupe: true,
        }
    }

    #[test]
    fn blocklist_matches_subdomains() {
        let mut o = opts();
        o.blocked_domains.insert("spam.com".into());
        let kept = filter_results(
            vec![
                result("https://spam.com/a", 0.9),
                result("https://a.b.spam.com/b", 0.9),
                result("https://notspam.com/c", 0.9),
            ],
            &o,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://notspam.com/c");
    }

    #[test]
    fn allowlist_overrides_credibility() {
        let mut o = opts();
        o.allow_domains.insert("trusted.org".into());
        let kept = filter_results(vec![result("https://trusted.org/a", 0.40)], &o);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn allowlist_overrides_blocklist() {
        let mut o = opts();
        o.allow_domains.insert("both.com".into());
        o.blocked_domains.insert("both.com".into());
        let kept = filter_results(vec![result("https://both.com/a", 0.9)], &o);
        assert_eq!(kept.len(), 1, "allowlist wins over blocklist");
    }

    #[test]
    fn credibility_threshold_is_inclusive() {
        let kept = filter_results(
            vec![result("https://x.org/a", 0.6), result("https://x.org/b", 0.59)],
            &opts(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://x.org/a");
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut first = result("https://x.org/a", 0.9);
        first.title = "first".into();
        let mut second = result("https://x.org/a", 0.9);
        second.title = "second".into();

        let kept = filter_results(vec![first.clone(), second.clone()], &opts());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "first");

        let mut o = opts();
        o.dedupe = false;
        let kept = filter_results(vec![first, second], &o);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn required_terms_are_case_insensitive_substrings() {
        let mut o = opts();
        o.required_terms.insert("Climate".into());
        let mut hit = result("https://x.org/a", 0.9);
        hit.snippet = "notes on climate change".into();
        let miss = result("https://x.org/b", 0.9);

        let kept = filter_results(vec![hit, miss], &o);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://x.org/a");
    }

    #[test]
    fn explicit_source_domain_takes_precedence_over_url() {
        let mut o = opts();
        o.blocked_domains.insert("spam.com".into());
        let mut r = result("https://fine.org/a", 0.9);
        r.source_domain = Some("spam.com".into());
        assert!(filter_results(vec![r], &o).is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let kept = filter_results(
            vec![
                result("https://x.org/1", 0.9),
                result("https://x.org/2", 0.1),
                result("https://x.org/3", 0.7),
            ],
            &opts(),
        );
        let urls: Vec<_> = kept.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.org/1", "https://x.org/3"]);
    }

    #[test]
    fn unparseable_url_yields_empty_domain() {
        // No domain checks can match, but credibility still applies.
        let kept = filter_results(vec![result("not a url", 0.9)], &opts());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn default_options_seed_blocklist() {
        let o = FilterOptions::default();
        assert!(o.blocked_domains.contains("example-spam.com"));
        assert!(o.dedupe);
        assert_eq!(o.min_credibility, 0.6);
    }
}
