//! Keyword-relevance excerpt extraction and result accumulation.
//!
//! For each raw result the aggregator keeps only the sentences that mention a
//! keyword token, each padded with one sentence of context before and one
//! after. Results with no matching sentence are discarded.

use crate::types::{RawResult, SearchResult};

/// Sentence terminators, ASCII and full-width.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Splits one paragraph into trimmed, non-empty sentences.
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    paragraph
        .split(SENTENCE_TERMINATORS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased whitespace-separated tokens of `keyword`.
fn keyword_tokens(keyword: &str) -> Vec<String> {
    keyword.split_whitespace().map(str::to_lowercase).collect()
}

/// Returns the context excerpts of `content` that mention any keyword token.
///
/// Each line is a paragraph. An excerpt is the matching sentence with its
/// neighbours in the same paragraph, joined by a single space. Duplicate
/// excerpts are kept once, in first-seen order.
pub fn extract_excerpts(content: &str, keyword: &str) -> Vec<String> {
    let tokens = keyword_tokens(keyword);
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut excerpts: Vec<String> = Vec::new();
    for paragraph in content.lines() {
        let sentences = split_sentences(paragraph);
        for (i, sentence) in sentences.iter().enumerate() {
            let lowered = sentence.to_lowercase();
            if !tokens.iter().any(|t| lowered.contains(t.as_str())) {
                continue;
            }
            let start = i.saturating_sub(1);
            let end = (i + 2).min(sentences.len());
            let excerpt = sentences[start..end].join(" ");
            if !excerpts.contains(&excerpt) {
                excerpts.push(excerpt);
            }
        }
    }
    excerpts
}

/// Request-scoped accumulator of excerpted search results.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<SearchResult>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Excerpts `raw` against `keyword` and stores the result under
    /// `platform`. Stores nothing when no sentence matches.
    pub fn add_result(&mut self, platform: &str, raw: &RawResult, keyword: &str) {
        let excerpts = extract_excerpts(&raw.content, keyword);
        if excerpts.is_empty() {
            tracing::trace!(platform, "raw result has no keyword match, discarded");
            return;
        }
        self.results.push(SearchResult {
            platform: platform.to_owned(),
            content: excerpts.join("\n"),
            url: raw.url.clone(),
            metadata: raw.metadata.clone(),
        });
    }

    /// Adds every raw result under its own platform label.
    pub fn add_batch<'a, I>(&mut self, raws: I, keyword: &str)
    where
        I: IntoIterator<Item = &'a RawResult>,
    {
        for raw in raws {
            self.add_result(&raw.platform, raw, keyword);
        }
    }

    /// Accumulated results ordered by platform; insertion order is kept
    /// within a platform.
    pub fn get_aggregated(&self) -> Vec<SearchResult> {
        let mut results = self.results.clone();
        results.sort_by(|a, b| a.platform.cmp(&b.platform));
        results
    }

    /// Consumes the aggregator, returning results ordered as in
    /// [`get_aggregated`](Self::get_aggregated).
    pub fn into_aggregated(mut self) -> Vec<SearchResult> {
        self.results.sort_by(|a, b| a.platform.cmp(&b.platform));
        self.results
    }

    /// Empties the store.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
