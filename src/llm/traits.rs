use std::future::Future;
use std::pin::Pin;

/// A chat-completion backend. Implementations own their transport and auth.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openai", "ollama").
    fn name(&self) -> &str;

    fn chat<'a>(
        &'a self,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.chat_with_system(None, message, model, temperature)
                .await
        })
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn chat_with_system<'a>(
            &'a self,
            system_prompt: Option<&'a str>,
            message: &'a str,
            model: &'a str,
            _temperature: f64,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                Ok(format!(
                    "{}|{model}|{message}",
                    system_prompt.unwrap_or("-")
                ))
            })
        }
    }

    #[tokio::test]
    async fn chat_defaults_to_no_system_prompt() {
        let reply = Echo.chat("hi", "m1", 0.0).await.unwrap();
        assert_eq!(reply, "-|m1|hi");
    }
}
