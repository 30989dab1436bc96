mod defaults;
pub mod engine;

pub use engine::TeraEngine;

use std::path::Path;
use strum::IntoEnumIterator;
use tera::Context;

/// Every prompt the workflow renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Prompt {
    ParseRequest,
    Relevance,
    ReportSystem,
    ReportContent,
    PostSystem,
    PostRequest,
    CondenseSystem,
    CondenseRequest,
    RewriteSystem,
    RouteResponse,
    ExtractDate,
    ValidateImages,
    RerankImages,
    ReviewDescription,
    PublishTask,
}

impl Prompt {
    fn builtin(self) -> &'static str {
        match self {
            Self::ParseRequest => defaults::PARSE_REQUEST,
            Self::Relevance => defaults::RELEVANCE,
            Self::ReportSystem => defaults::REPORT_SYSTEM,
            Self::ReportContent => defaults::REPORT_CONTENT,
            Self::PostSystem => defaults::POST_SYSTEM,
            Self::PostRequest => defaults::POST_REQUEST,
            Self::CondenseSystem => defaults::CONDENSE_SYSTEM,
            Self::CondenseRequest => defaults::CONDENSE_REQUEST,
            Self::RewriteSystem => defaults::REWRITE_SYSTEM,
            Self::RouteResponse => defaults::ROUTE_RESPONSE,
            Self::ExtractDate => defaults::EXTRACT_DATE,
            Self::ValidateImages => defaults::VALIDATE_IMAGES,
            Self::RerankImages => defaults::RERANK_IMAGES,
            Self::ReviewDescription => defaults::REVIEW_DESCRIPTION,
            Self::PublishTask => defaults::PUBLISH_TASK,
        }
    }
}

/// The prompt templates injected into the workflow and publisher.
pub struct PromptSet {
    engine: TeraEngine,
}

impl PromptSet {
    pub fn builtin() -> anyhow::Result<Self> {
        let mut engine = TeraEngine::new();
        for prompt in Prompt::iter() {
            engine.add_template(prompt.as_ref(), prompt.builtin())?;
        }
        Ok(Self { engine })
    }

    /// Built-in templates with any `<name>.tera` files in `dir` layered on top.
    pub fn with_overrides(dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut set = Self::builtin()?;
        if let Some(dir) = dir {
            for prompt in Prompt::iter() {
                if set.engine.add_template_file(dir, prompt.as_ref())? {
                    tracing::info!(prompt = %prompt, dir = %dir.display(), "using prompt override");
                }
            }
        }
        Ok(set)
    }

    pub fn set(&mut self, prompt: Prompt, template: &str) -> anyhow::Result<()> {
        self.engine.add_template(prompt.as_ref(), template)
    }

    pub fn render(&self, prompt: Prompt, context: &Context) -> anyhow::Result<String> {
        self.engine.render(prompt.as_ref(), context)
    }
}
