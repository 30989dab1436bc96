use super::structured::parse_structured;
use super::traits::Provider;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A provider bound to one model and temperature; each workflow step owns one.
#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn invoke(&self, system_prompt: &str, message: &str) -> anyhow::Result<String> {
        self.provider
            .chat_with_system(Some(system_prompt), message, &self.model, self.temperature)
            .await
    }

    /// Invokes the model and parses the first JSON object of its reply.
    pub async fn invoke_structured<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        message: &str,
    ) -> anyhow::Result<T> {
        let reply = self.invoke(system_prompt, message).await?;
        parse_structured(&reply)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}
