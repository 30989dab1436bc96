use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("POSTWRIGHT_API_KEY").or_else(|_| std::env::var("API_KEY"))
            && !key.is_empty()
        {
            self.llm.api_key = Some(key);
        }

        if let Ok(workspace) = std::env::var("POSTWRIGHT_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(port_str) =
            std::env::var("POSTWRIGHT_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) =
            std::env::var("POSTWRIGHT_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(tz) = std::env::var("POSTWRIGHT_TIMEZONE")
            && !tz.is_empty()
        {
            self.workflow.timezone = tz;
        }

        if let Ok(level) = std::env::var("POSTWRIGHT_LOG_LEVEL")
            && !level.is_empty()
        {
            self.logging.level = level;
        }
    }
}
