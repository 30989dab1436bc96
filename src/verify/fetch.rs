use crate::config::VerifyConfig;
use crate::post::text::truncate_chars;
use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Readable content of one source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub text: String,
    /// Absolute image URLs found on the page, `og:image` first.
    pub image_urls: Vec<String>,
}

/// Web access used by verification, image review and scheduling.
pub trait WebFetcher: Send + Sync {
    fn fetch_page<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>>;

    /// MIME essence (`image/png`) from the response headers, if any.
    fn content_type<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

    fn download<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}

pub struct HttpWebFetcher {
    client: reqwest::Client,
    max_content_chars: usize,
}

impl HttpWebFetcher {
    pub fn new(config: &VerifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            max_content_chars: config.max_content_chars,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{url} returned {status}");
        }
        Ok(response)
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let base = Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
        let response = self.get(url).await?;
        let is_html = header_mime(&response).is_some_and(|ct| ct == "text/html");
        let body = response.text().await.context("failed to read page body")?;

        if is_html {
            let (text, image_urls) = extract_from_html(&base, &body);
            Ok(FetchedPage {
                url: url.to_string(),
                text: truncate_chars(&text, self.max_content_chars).to_string(),
                image_urls,
            })
        } else {
            Ok(FetchedPage {
                url: url.to_string(),
                text: truncate_chars(body.trim(), self.max_content_chars).to_string(),
                image_urls: Vec::new(),
            })
        }
    }
}

impl WebFetcher for HttpWebFetcher {
    fn fetch_page<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>> {
        Box::pin(self.fetch(url))
    }

    fn content_type<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.get(url).await?;
            Ok(header_mime(&response))
        })
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.get(url).await?;
            let bytes = response
                .bytes()
                .await
                .with_context(|| format!("failed to read body of {url}"))?;
            Ok(bytes.to_vec())
        })
    }
}

fn header_mime(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str().to_string())
}

fn extract_from_html(base: &Url, html: &str) -> (String, Vec<String>) {
    let document = Html::parse_document(html);

    let text = extract_element_text(&document, "article")
        .or_else(|| extract_element_text(&document, "main"))
        .or_else(|| extract_element_text(&document, "body"))
        .unwrap_or_default();

    let mut images = Vec::new();
    let mut push = |raw: &str| {
        if let Ok(resolved) = base.join(raw.trim())
            && matches!(resolved.scheme(), "http" | "https")
        {
            let resolved = resolved.to_string();
            if !images.contains(&resolved) {
                images.push(resolved);
            }
        }
    };

    if let Ok(sel) = Selector::parse(r#"meta[property="og:image"]"#) {
        for el in document.select(&sel) {
            if let Some(content) = el.value().attr("content") {
                push(content);
            }
        }
    }
    if let Ok(sel) = Selector::parse("img[src]") {
        for el in document.select(&sel) {
            if let Some(src) = el.value().attr("src") {
                push(src);
            }
        }
    }

    (text, images)
}

fn extract_element_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let element = document.select(&sel).next()?;
    let text: String = element.text().collect::<Vec<_>>().join(" ");
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
