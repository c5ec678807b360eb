//! Request, result and response types shared by the search pipeline.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unprocessed output of one plugin search hit.
///
/// Plugins may hand back entries with empty fields; the registry drops those
/// before they reach the aggregator (see [`RawResult::validate`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Platform label the hit came from.
    #[serde(default)]
    pub platform: String,
    /// Full text of the hit.
    #[serde(default)]
    pub content: String,
    /// Link back to the source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form string metadata (title, author, publish date, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RawResult {
    /// Convenience constructor without url or metadata.
    pub fn new(platform: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            content: content.into(),
            url: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the url.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Checks that `platform` and `content` are non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.platform.trim().is_empty() {
            return Err(ValidationError::MissingPlatform);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingContent);
        }
        Ok(())
    }
}

/// One logical search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Keyword; several whitespace-separated words match with OR semantics.
    pub keyword: String,
    /// Restrict the search to these plugin names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    /// Overall deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl SearchRequest {
    /// A request for `keyword` across every running plugin.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            platforms: None,
            timeout: None,
        }
    }

    /// Restricts the request to the given plugins.
    #[must_use]
    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = Some(platforms.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }
}

/// An excerpted, keyword-relevant search result.
///
/// Only the [`ResultAggregator`](crate::aggregator::ResultAggregator)
/// produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Platform the excerpt came from.
    pub platform: String,
    /// Newline-separated excerpts.
    pub content: String,
    /// Link back to the source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Metadata carried over from the raw result.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Merged response of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The keyword that was searched.
    pub keyword: String,
    /// Excerpts ordered by platform.
    pub results: Vec<SearchResult>,
    /// `"; "`-joined failure messages, present iff at least one plugin failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn valid_raw_result_passes() {
        let raw = RawResult::new("news", "Markets rallied today.");
        assert_eq!(raw.validate(), Ok(()));
    }

    #[test]
    fn blank_platform_is_rejected() {
        let raw = RawResult::new("  ", "content");
        assert_eq!(raw.validate(), Err(ValidationError::MissingPlatform));
    }

    #[test]
    fn empty_content_is_rejected() {
        let raw = RawResult::new("news", "");
        assert_eq!(raw.validate(), Err(ValidationError::MissingContent));
    }

    #[test]
    fn raw_result_missing_fields_deserialize_as_empty() {
        let raw: RawResult = serde_json::from_str(r#"{"content":"text"}"#).expect("deserialize");
        assert!(raw.platform.is_empty());
        assert!(raw.url.is_none());
        assert!(raw.metadata.is_empty());
        assert!(raw.validate().is_err());
    }

    #[test]
    fn search_request_deserializes_optional_fields() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"keyword":"rust","platforms":["a","b"],"timeout":5}"#)
                .expect("deserialize");
        assert_eq!(req.keyword, "rust");
        assert_eq!(req.platforms.as_deref(), Some(&["a".to_owned(), "b".to_owned()][..]));
        assert_eq!(req.timeout, Some(5));

        let bare: SearchRequest = serde_json::from_str(r#"{"keyword":"rust"}"#).expect("bare");
        assert_eq!(bare, SearchRequest::new("rust"));
    }

    #[test]
    fn response_without_error_omits_field() {
        let resp = SearchResponse {
            keyword: "rust".into(),
            results: vec![],
            error: None,
        };
        let json = serde_json::to_string(&resp).expect("serialize");
        assert!(!json.contains("error"));
    }
}
