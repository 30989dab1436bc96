use std::path::Path;
use tera::Tera;

/// Tera-backed template engine; templates are registered from strings.
pub struct TeraEngine {
    tera: Tera,
}

impl TeraEngine {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
        }
    }

    /// Register a template from a string, replacing any previous one.
    pub fn add_template(&mut self, name: &str, content: &str) -> anyhow::Result<()> {
        self.tera
            .add_raw_template(name, content)
            .map_err(|e| anyhow::anyhow!("template '{name}' is invalid: {e}"))
    }

    /// Register `<name>.tera` from `dir` when the file exists. Returns whether it did.
    pub fn add_template_file(&mut self, dir: &Path, name: &str) -> anyhow::Result<bool> {
        let path = dir.join(format!("{name}.tera"));
        if !path.is_file() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        self.add_template(name, &content)?;
        Ok(true)
    }

    /// Render a named template with the given context.
    pub fn render(&self, template_name: &str, context: &tera::Context) -> anyhow::Result<String> {
        self.tera
            .render(template_name, context)
            .map_err(|e| anyhow::anyhow!("failed to render '{template_name}': {}", error_chain(&e)))
    }
}

/// Tera hides the useful cause (missing variable, bad filter) behind `source()`.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
