use super::compatible::OpenAiCompatibleProvider;
use super::model::ChatModel;
use super::traits::Provider;
use crate::config::{LlmConfig, WorkflowConfig};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Built-in OpenAI-compatible endpoints addressable by name.
fn builtin_endpoint(name: &str) -> Option<(&'static str, bool)> {
    match name {
        "openai" => Some(("https://api.openai.com/v1", true)),
        "openrouter" => Some(("https://openrouter.ai/api/v1", true)),
        "groq" => Some(("https://api.groq.com/openai/v1", true)),
        "ollama" => Some(("http://localhost:11434/v1", false)),
        _ => None,
    }
}

/// Splits `provider/model`; the model part may itself contain slashes.
pub fn split_model_spec(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, model))
        }
        _ => anyhow::bail!("model spec '{spec}' must look like 'provider/model'"),
    }
}

/// Resolves model specs into chat models, sharing one provider per endpoint.
pub struct ModelFactory<'a> {
    config: &'a LlmConfig,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl<'a> ModelFactory<'a> {
    pub fn new(config: &'a LlmConfig) -> Self {
        Self {
            config,
            providers: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, spec: &str) -> Result<ChatModel> {
        let (provider_name, model) = split_model_spec(spec)?;
        let provider = match self.providers.get(provider_name) {
            Some(provider) => Arc::clone(provider),
            None => {
                let provider = self.build_provider(provider_name)?;
                self.providers
                    .insert(provider_name.to_string(), Arc::clone(&provider));
                provider
            }
        };
        Ok(ChatModel::new(provider, model, self.config.temperature))
    }

    fn build_provider(&self, name: &str) -> Result<Arc<dyn Provider>> {
        if let Some(endpoint) = self.config.providers.get(name) {
            let key = endpoint
                .api_key
                .as_deref()
                .or(self.config.api_key.as_deref());
            let provider =
                OpenAiCompatibleProvider::new(name, &endpoint.base_url, key, self.config.timeout_secs);
            let provider = if key.is_none() {
                provider.without_key_requirement()
            } else {
                provider
            };
            return Ok(Arc::new(provider));
        }

        let Some((base_url, requires_key)) = builtin_endpoint(name) else {
            anyhow::bail!(
                "unknown provider '{name}'; add [llm.providers.{name}] with a base_url to config.toml"
            );
        };
        let provider = OpenAiCompatibleProvider::new(
            name,
            base_url,
            self.config.api_key.as_deref(),
            self.config.timeout_secs,
        );
        Ok(Arc::new(if requires_key {
            provider
        } else {
            provider.without_key_requirement()
        }))
    }
}

/// One chat model per workflow step.
#[derive(Clone, Debug)]
pub struct WorkflowModels {
    pub parse_request: ChatModel,
    pub relevance: ChatModel,
    pub report: ChatModel,
    pub post: ChatModel,
    pub rewrite: ChatModel,
    pub route: ChatModel,
    pub images: ChatModel,
}

impl WorkflowModels {
    pub fn from_config(llm: &LlmConfig, workflow: &WorkflowConfig) -> Result<Self> {
        let mut factory = ModelFactory::new(llm);
        Ok(Self {
            parse_request: factory.resolve(&workflow.parse_request_model)?,
            relevance: factory.resolve(&workflow.relevance_model)?,
            report: factory.resolve(&workflow.report_model)?,
            post: factory.resolve(&workflow.post_model)?,
            rewrite: factory.resolve(&workflow.rewrite_model)?,
            route: factory.resolve(&workflow.route_model)?,
            images: factory.resolve(&workflow.images_model)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEndpoint;

    #[test]
    fn split_keeps_nested_model_path() {
        let (provider, model) = split_model_spec("openrouter/anthropic/claude-3.5-sonnet").unwrap();
        assert_eq!(provider, "openrouter");
        assert_eq!(model, "anthropic/claude-3.5-sonnet");
    }

    #[test]
    fn split_rejects_bare_model() {
        assert!(split_model_spec("gpt-4o").is_err());
        assert!(split_model_spec("/gpt-4o").is_err());
        assert!(split_model_spec("openai/").is_err());
    }

    #[test]
    fn resolves_builtin_provider() {
        let config = LlmConfig::default();
        let mut factory = ModelFactory::new(&config);
        let model = factory.resolve("openai/gpt-4o-mini").unwrap();
        assert_eq!(model.provider_name(), "openai");
        assert_eq!(model.model(), "gpt-4o-mini");
    }

    #[test]
    fn configured_endpoint_wins_over_unknown() {
        let mut config = LlmConfig::default();
        config.providers.insert(
            "local".into(),
            ProviderEndpoint {
                base_url: "http://127.0.0.1:9000/v1".into(),
                api_key: None,
            },
        );
        let mut factory = ModelFactory::new(&config);
        assert_eq!(factory.resolve("local/qwen").unwrap().provider_name(), "local");
        assert!(factory.resolve("mystery/model").is_err());
    }

    #[test]
    fn providers_are_shared_between_steps() {
        let config = LlmConfig::default();
        let mut factory = ModelFactory::new(&config);
        factory.resolve("openai/a").unwrap();
        factory.resolve("openai/b").unwrap();
        assert_eq!(factory.providers.len(), 1);
    }

    #[test]
    fn workflow_models_from_defaults() {
        let models =
            WorkflowModels::from_config(&LlmConfig::default(), &WorkflowConfig::default()).unwrap();
        assert_eq!(models.route.model(), "gpt-4o-mini");
        assert_eq!(models.images.model(), "gpt-4o");
    }
}
