//! Web-page plugins: fetch configured URLs and keep pages that mention the
//! keyword.
//!
//! Settings read from the descriptor's `[settings]` table:
//!
//! ```toml
//! [settings]
//! urls = ["https://example.com/news", "https://example.com/blog"]
//! source = "Example News"          # optional, copied into metadata
//!
//! [settings.request.headers]       # optional
//! Accept-Language = "en"
//! ```

use super::{BindContext, CapabilityBinder, PluginCapability};
use crate::config::HttpSettings;
use crate::error::CapabilityError;
use crate::types::RawResult;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Elements whose text never counts as page content.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "template",
];

/// Content containers tried in order; `body` is the fallback.
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Upper bound on extracted text per page, in bytes.
pub const MAX_PAGE_CHARS: usize = 100_000;

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Build the shared [`reqwest::Client`] for web-page plugins.
///
/// # Errors
///
/// Returns [`CapabilityError::Http`] if the client cannot be constructed.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, CapabilityError> {
    let ua = match settings.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| CapabilityError::Http(format!("failed to build HTTP client: {e}")))
}

/// Title and readable text of one HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Contents of `<title>`, trimmed. Empty when missing.
    pub title: String,
    /// Whitespace-collapsed text of the main content area.
    pub text: String,
}

/// Extracts the title and readable text from raw HTML.
///
/// Text inside boilerplate elements (scripts, styles, navigation, ...) is
/// skipped. The first non-empty container among `article`, `main`,
/// `[role="main"]` and `body` wins.
pub fn extract_page(html: &str) -> PageText {
    let document = Html::parse_document(html);
    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_owned())
        })
        .unwrap_or_default();

    let text = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            let text = document.select(&selector).next().map(readable_text)?;
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_default();

    PageText {
        title,
        text: truncate_to_limit(text, MAX_PAGE_CHARS),
    }
}

fn readable_text(root: ElementRef<'_>) -> String {
    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| BOILERPLATE_TAGS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn truncate_to_limit(mut text: String, max_bytes: usize) -> String {
    if text.len() > max_bytes {
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Parsed `[settings]` of a web-page plugin.
#[derive(Debug, Clone)]
struct WebSettings {
    urls: Vec<String>,
    headers: HeaderMap,
    source: Option<String>,
}

impl WebSettings {
    fn parse(settings: &toml::Table) -> Result<Self, CapabilityError> {
        let urls: Vec<String> = settings
            .get("urls")
            .and_then(|v| v.as_array())
            .ok_or_else(|| CapabilityError::Parse("settings.urls must be an array".to_owned()))?
            .iter()
            .map(|v| {
                v.as_str().map(str::to_owned).ok_or_else(|| {
                    CapabilityError::Parse("settings.urls must contain only strings".to_owned())
                })
            })
            .collect::<Result<_, _>>()?;
        if urls.is_empty() {
            return Err(CapabilityError::Parse(
                "settings.urls must not be empty".to_owned(),
            ));
        }

        let mut headers = HeaderMap::new();
        let declared = settings
            .get("request")
            .and_then(|r| r.as_table())
            .and_then(|r| r.get("headers"))
            .and_then(|h| h.as_table());
        for (key, value) in declared.into_iter().flatten() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| CapabilityError::Parse(format!("invalid header name {key:?}: {e}")))?;
            let value = value.as_str().ok_or_else(|| {
                CapabilityError::Parse(format!("header {key:?} must be a string"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                CapabilityError::Parse(format!("invalid value for header {key:?}: {e}"))
            })?;
            headers.insert(name, value);
        }

        let source = settings
            .get("source")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        Ok(Self {
            urls,
            headers,
            source,
        })
    }
}

/// Capability that fetches a fixed list of pages.
#[derive(Debug)]
pub struct WebCapability {
    name: String,
    client: reqwest::Client,
    settings: WebSettings,
}

impl WebCapability {
    async fn fetch(&self, url: &str) -> Result<PageText, CapabilityError> {
        let response = self
            .client
            .get(url)
            .headers(self.settings.headers.clone())
            .send()
            .await
            .map_err(|e| CapabilityError::Http(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Http(format!("{url} returned {status}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| CapabilityError::Http(format!("{url}: failed to read body: {e}")))?;
        Ok(extract_page(&html))
    }
}

#[async_trait]
impl PluginCapability for WebCapability {
    async fn search(&self, keyword: &str) -> Result<Vec<RawResult>, CapabilityError> {
        let tokens: Vec<String> = keyword.split_whitespace().map(str::to_lowercase).collect();
        let pages =
            futures::future::join_all(self.settings.urls.iter().map(|url| self.fetch(url))).await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (url, page) in self.settings.urls.iter().zip(pages) {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(plugin = %self.name, %url, error = %e, "page fetch failed");
                    failures.push(e.to_string());
                    continue;
                }
            };
            let lowered = page.text.to_lowercase();
            if !tokens.iter().any(|t| lowered.contains(t.as_str())) {
                continue;
            }
            let mut raw = RawResult::new(self.name.clone(), page.text).with_url(url.clone());
            if !page.title.is_empty() {
                raw = raw.with_metadata("title", page.title);
            }
            if let Some(source) = &self.settings.source {
                raw = raw.with_metadata("source", source.clone());
            }
            results.push(raw);
        }

        if failures.len() == self.settings.urls.len() {
            return Err(CapabilityError::Http(failures.join("; ")));
        }
        tracing::debug!(plugin = %self.name, matched = results.len(), "web search complete");
        Ok(results)
    }

    async fn health_check(&self) -> Result<bool, CapabilityError> {
        let Some(url) = self.settings.urls.first() else {
            return Ok(false);
        };
        let response = self
            .client
            .get(url)
            .headers(self.settings.headers.clone())
            .send()
            .await
            .map_err(|e| CapabilityError::Http(format!("{url}: {e}")))?;
        Ok(response.status().is_success())
    }
}

/// Binds `protocol = "http"` descriptors to [`WebCapability`].
#[derive(Debug, Clone)]
pub struct WebBinder {
    client: reqwest::Client,
}

impl WebBinder {
    /// Builds the shared client from `[http]` settings.
    pub fn new(settings: &HttpSettings) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: build_client(settings)?,
        })
    }
}

impl CapabilityBinder for WebBinder {
    fn protocol(&self) -> &str {
        "http"
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Arc<dyn PluginCapability>, CapabilityError> {
        let settings = WebSettings::parse(&ctx.descriptor.settings)?;
        Ok(Arc::new(WebCapability {
            name: ctx.descriptor.name.clone(),
            client: self.client.clone(),
            settings,
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn table(s: &str) -> toml::Table {
        toml::from_str(s).expect("toml")
    }

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn build_client_with_custom_ua() {
        let settings = HttpSettings {
            user_agent: Some("CustomBot/1.0".into()),
            ..Default::default()
        };
        assert!(build_client(&settings).is_ok());
    }

    #[test]
    fn extract_title_and_article() {
        let html = r#"<html><head><title> Daily News </title></head>
            <body><nav>Home | About</nav>
            <article><h1>Rust 2.0</h1><p>Rust   ships a new
            edition.</p><script>var x = "rust";</script></article>
            <footer>Copyright</footer></body></html>"#;
        let page = extract_page(html);
        assert_eq!(page.title, "Daily News");
        assert_eq!(page.text, "Rust 2.0 Rust ships a new edition.");
    }

    #[test]
    fn falls_back_to_body_without_boilerplate() {
        let html = "<html><body><header>Site</header><p>Hello world.</p><style>p{}</style></body></html>";
        let page = extract_page(html);
        assert!(page.title.is_empty());
        assert_eq!(page.text, "Hello world.");
    }

    #[test]
    fn empty_article_falls_through_to_main() {
        let html = "<body><article><script>x</script></article><main>Main text</main></body>";
        assert_eq!(extract_page(html).text, "Main text");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "héllo".to_owned();
        assert_eq!(truncate_to_limit(text, 2), "h");
    }

    #[test]
    fn settings_parse_urls_headers_and_source() {
        let s = WebSettings::parse(&table(
            r#"
urls = ["https://a.example", "https://b.example"]
source = "Example"
[request.headers]
Accept-Language = "en"
"#,
        ))
        .expect("parse");
        assert_eq!(s.urls.len(), 2);
        assert_eq!(s.source.as_deref(), Some("Example"));
        assert_eq!(
            s.headers.get("accept-language").and_then(|v| v.to_str().ok()),
            Some("en")
        );
    }

    #[test]
    fn settings_without_urls_rejected() {
        let err = WebSettings::parse(&table("source = \"x\"")).unwrap_err();
        assert!(err.to_string().contains("settings.urls"));
    }

    #[test]
    fn settings_with_empty_urls_rejected() {
        assert!(WebSettings::parse(&table("urls = []")).is_err());
    }

    #[test]
    fn settings_with_non_string_url_rejected() {
        assert!(WebSettings::parse(&table("urls = [1]")).is_err());
    }

    #[test]
    fn settings_with_bad_header_rejected() {
        let err = WebSettings::parse(&table(
            "urls = [\"https://a\"]\n[request.headers]\n\"bad header\" = \"x\"\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("header"));
    }
}
