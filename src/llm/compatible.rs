//! OpenAI-compatible chat completions provider.
//! OpenAI, OpenRouter, Groq and Ollama all accept the same `/chat/completions` body.

use super::traits::Provider;
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 400;

pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    /// Local servers (ollama) accept unauthenticated requests.
    requires_key: bool,
    /// Pre-computed `Authorization` header value.
    cached_auth: Option<String>,
    cached_chat_url: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let cached_chat_url = if base_url.ends_with("chat/completions") {
            base_url.clone()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            cached_auth: api_key.map(|k| format!("Bearer {k}")),
            api_key: api_key.map(ToString::to_string),
            requires_key: true,
            base_url,
            cached_chat_url,
            client: build_client(timeout_secs),
        }
    }

    pub fn without_key_requirement(mut self) -> Self {
        self.requires_key = false;
        self
    }

    async fn complete(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        if self.requires_key && self.api_key.is_none() {
            anyhow::bail!(
                "{} API key not set. Add it to config.toml or set POSTWRIGHT_API_KEY.",
                self.name
            );
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(Message {
                role: "system",
                content: sys.to_string(),
            });
        }
        messages.push(Message {
            role: "user",
            content: message.to_string(),
        });

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        };

        let mut builder = self.client.post(&self.cached_chat_url).json(&request);
        if let Some(auth) = &self.cached_auth {
            builder = builder.header("Authorization", auth);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} chat completions request failed", self.name))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
            anyhow::bail!(
                "{} API error ({status}): {}",
                self.name,
                truncate_error(&body)
            );
        }

        let chat: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
    }
}

impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(self.complete(system_prompt, message, model, temperature))
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn truncate_error(body: &str) -> String {
    if body.chars().count() <= MAX_API_ERROR_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
