use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(".postwright"))
    }

    /// Load `config.toml` from `root`, writing defaults on first run.
    pub fn load_or_init_in(root: &Path) -> Result<Self> {
        let config_path = root.join("config.toml");

        if !root.exists() {
            fs::create_dir_all(root).context("Failed to create .postwright directory")?;
        }
        fs::create_dir_all(root.join("workspace"))
            .context("Failed to create workspace directory")?;

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = root.join("workspace");
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: root.join("workspace"),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let workflow = &self.workflow;
        if workflow.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Validation(format!(
                "workflow.timezone '{}' is not an IANA timezone",
                workflow.timezone
            )));
        }
        if workflow.max_post_length == 0 {
            return Err(ConfigError::Validation(
                "workflow.max_post_length must be greater than 0".into(),
            ));
        }
        for (field, spec) in [
            ("parse_request_model", &workflow.parse_request_model),
            ("relevance_model", &workflow.relevance_model),
            ("report_model", &workflow.report_model),
            ("post_model", &workflow.post_model),
            ("rewrite_model", &workflow.rewrite_model),
            ("route_model", &workflow.route_model),
            ("images_model", &workflow.images_model),
        ] {
            match spec.split_once('/') {
                Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {}
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "workflow.{field} must look like 'provider/model', got '{spec}'"
                    )));
                }
            }
        }
        if self.publisher.poll_interval_secs < 5 {
            return Err(ConfigError::Validation(
                "publisher.poll_interval_secs must be at least 5".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(
                "llm.temperature must be within 0.0..=2.0".into(),
            ));
        }
        Ok(())
    }

    /// Configured timezone; falls back to UTC when validation was skipped.
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.workflow.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn image_dir(&self) -> Option<PathBuf> {
        self.workflow.image_dir.as_deref().map(expand_path)
    }

    pub fn template_dir(&self) -> Option<PathBuf> {
        self.prompts.template_dir.as_deref().map(expand_path)
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::ENV_LOCK;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_default_config() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".postwright");

        let config = Config::load_or_init_in(&root).unwrap();

        assert!(root.join("config.toml").exists());
        assert!(root.join("workspace").is_dir());
        assert_eq!(config.workspace_dir, root.join("workspace"));
        assert_eq!(config.database_path(), root.join("workspace/postwright.db"));
    }

    #[test]
    fn existing_config_is_read_back() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::write(
            root.join("config.toml"),
            "[workflow]\nmax_condense_count = 1\ntimezone = \"Europe/Berlin\"\n",
        )
        .unwrap();

        let config = Config::load_or_init_in(&root).unwrap();

        assert_eq!(config.workflow.max_condense_count, 1);
        assert_eq!(config.timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let mut config = Config::default();
        config.workflow.timezone = "Mars/Olympus".into();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn rejects_model_without_provider() {
        let mut config = Config::default();
        config.workflow.route_model = "gpt-4o".into();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("route_model"));

        let mut config = Config::default();
        config.workflow.images_model = "openai/".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("images_model"));
    }

    #[test]
    fn rejects_zero_post_length_and_fast_polling() {
        let mut config = Config::default();
        config.workflow.max_post_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.publisher.poll_interval_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tilde_paths_expand() {
        let mut config = Config::default();
        config.workflow.image_dir = Some("/srv/images".into());
        assert_eq!(config.image_dir(), Some(PathBuf::from("/srv/images")));

        config.prompts.template_dir = Some("~/prompts".into());
        let dir = config.template_dir().unwrap();
        assert!(dir.ends_with("prompts"));
    }
}
