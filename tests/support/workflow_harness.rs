#![allow(dead_code, clippy::needless_lifetimes)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use tempfile::TempDir;

use postwright::config::WorkflowConfig;
use postwright::llm::{ChatModel, Provider, WorkflowModels};
use postwright::post::{PostWorkflow, WorkflowDeps};
use postwright::prompt::PromptSet;
use postwright::store::SqliteStore;
use postwright::verify::{FetchedPage, WebFetcher};

pub const PARSE: &str = "parse";
pub const RELEVANCE: &str = "relevance";
pub const REPORT: &str = "report";
pub const POST: &str = "post";
pub const REWRITE: &str = "rewrite";
pub const ROUTE: &str = "route";
pub const IMAGES: &str = "images";

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One recorded model invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub system_prompt: String,
    pub message: String,
}

/// A provider answering from per-model scripts. Each model's queue is
/// drained in order and its last reply repeats once the queue is empty.
#[derive(Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    last: Mutex<HashMap<String, String>>,
    responders: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, model: &str, text: impl Into<String>) -> &Self {
        self.queues
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(text.into());
        self
    }

    /// Answers `model` calls from the user message instead of the queue.
    pub fn respond_with<F>(&self, model: &str, responder: F) -> &Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap()
            .insert(model.to_string(), Box::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, model: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.model == model)
            .collect()
    }

    fn next_reply(&self, model: &str, message: &str) -> Result<String> {
        if let Some(responder) = self.responders.lock().unwrap().get(model) {
            return Ok(responder(message));
        }
        let queued = self
            .queues
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        match queued {
            Some(reply) => {
                last.insert(model.to_string(), reply.clone());
                Ok(reply)
            }
            None => last
                .get(model)
                .cloned()
                .ok_or_else(|| anyhow!("no scripted reply for model {model}")),
        }
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        _temperature: f64,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call {
                model: model.to_string(),
                system_prompt: system_prompt.unwrap_or_default().to_string(),
                message: message.to_string(),
            });
            self.next_reply(model, message)
        })
    }
}

pub fn scripted_models(provider: &Arc<ScriptedProvider>) -> WorkflowModels {
    let model = |name: &str| ChatModel::new(provider.clone(), name, 0.0);
    WorkflowModels {
        parse_request: model(PARSE),
        relevance: model(RELEVANCE),
        report: model(REPORT),
        post: model(POST),
        rewrite: model(REWRITE),
        route: model(ROUTE),
        images: model(IMAGES),
    }
}

/// In-memory web: pages, content types and downloadable bytes by URL.
/// Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedPage>,
    content_types: HashMap<String, String>,
    downloads: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: url.to_string(),
                text: text.to_string(),
                image_urls: Vec::new(),
            },
        );
        self
    }

    pub fn page_with_images(mut self, url: &str, text: &str, images: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: url.to_string(),
                text: text.to_string(),
                image_urls: images.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    pub fn image(mut self, url: &str, mime: &str, bytes: &[u8]) -> Self {
        self.content_types.insert(url.to_string(), mime.to_string());
        self.downloads.insert(url.to_string(), bytes.to_vec());
        self
    }
}

impl WebFetcher for StaticFetcher {
    fn fetch_page<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>> {
        Box::pin(async move {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {url}"))
        })
    }

    fn content_type<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.content_types.get(url).cloned()) })
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            self.downloads
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404: {url}"))
        })
    }
}

/// Smallest valid PNG header; enough for content sniffing.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

pub struct Harness {
    pub tmp: TempDir,
    pub store: SqliteStore,
    pub provider: Arc<ScriptedProvider>,
    pub workflow: Arc<PostWorkflow>,
}

pub fn test_config() -> WorkflowConfig {
    WorkflowConfig {
        timezone: "America/Los_Angeles".into(),
        ..WorkflowConfig::default()
    }
}

impl Harness {
    pub async fn new(
        provider: Arc<ScriptedProvider>,
        fetcher: StaticFetcher,
        config: WorkflowConfig,
    ) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("postwright.db"))
            .await
            .unwrap();
        let shared = Arc::new(store.clone());
        let timezone: Tz = config.timezone.parse().unwrap();

        let deps = WorkflowDeps {
            models: scripted_models(&provider),
            fetcher: Arc::new(fetcher),
            posts: shared.clone(),
            checkpoints: shared.clone(),
            rules: shared,
            prompts: Arc::new(PromptSet::builtin().unwrap()),
            config,
            timezone,
            image_dir: Some(tmp.path().join("images")),
        };

        Self {
            tmp,
            store,
            provider,
            workflow: Arc::new(PostWorkflow::new(deps)),
        }
    }
}

/// Scripts a happy path up to the first review: one on-topic source, a
/// report and a short post.
pub fn script_happy_path(provider: &ScriptedProvider, link: &str, post: &str) {
    provider
        .reply(
            PARSE,
            format!(r#"{{"topic": "Rust 2024 edition", "links": ["{link}"], "style": "news"}}"#),
        )
        .reply(RELEVANCE, r#"{"reasoning": "on topic", "relevant": true}"#)
        .reply(REPORT, "<report>The 2024 edition stabilizes async closures.</report>")
        .reply(POST, format!("<post>{post}</post>"));
}
