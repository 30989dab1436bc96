use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            config_path: PathBuf::from("config.toml"),
            llm: LlmConfig::default(),
            workflow: WorkflowConfig::default(),
            verify: VerifyConfig::default(),
            publisher: PublisherConfig::default(),
            gateway: GatewayConfig::default(),
            prompts: PromptsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Location of the sqlite database holding scheduled posts, checkpoints and rules.
    pub fn database_path(&self) -> PathBuf {
        self.workspace_dir.join("postwright.db")
    }
}

// ── LLM ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Fallback API key for providers without their own key.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra OpenAI-compatible endpoints addressable as `<name>/<model>`.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f64 {
    0.5
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            providers: BTreeMap::new(),
        }
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_model")]
    pub parse_request_model: String,
    #[serde(default = "default_model")]
    pub relevance_model: String,
    #[serde(default = "default_model")]
    pub report_model: String,
    #[serde(default = "default_model")]
    pub post_model: String,
    #[serde(default = "default_model")]
    pub rewrite_model: String,
    #[serde(default = "default_model")]
    pub route_model: String,
    /// Validates and ranks candidate images; should accept image URLs
    #[serde(default = "default_images_model")]
    pub images_model: String,
    /// Maximum post length in characters, URLs excluded (default: 1000)
    #[serde(default = "default_max_post_length")]
    pub max_post_length: usize,
    /// Condensation passes before the post goes to review regardless of length (default: 3)
    #[serde(default = "default_max_condense_count")]
    pub max_condense_count: u32,
    /// Skip image search and never attach images (default: false)
    #[serde(default)]
    pub text_only_mode: bool,
    /// IANA timezone used for default dates and priority windows
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Where attached images are downloaded when a post is scheduled
    #[serde(default)]
    pub image_dir: Option<String>,
    #[serde(default = "default_max_image_options")]
    pub max_image_options: usize,
}

fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}

fn default_images_model() -> String {
    "openai/gpt-4o".into()
}

fn default_max_post_length() -> usize {
    1000
}

fn default_max_condense_count() -> u32 {
    3
}

fn default_timezone() -> String {
    "America/Los_Angeles".into()
}

fn default_max_image_options() -> usize {
    5
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            parse_request_model: default_model(),
            relevance_model: default_model(),
            report_model: default_model(),
            post_model: default_model(),
            rewrite_model: default_model(),
            route_model: default_model(),
            images_model: default_images_model(),
            max_post_length: default_max_post_length(),
            max_condense_count: default_max_condense_count(),
            text_only_mode: false,
            timezone: default_timezone(),
            image_dir: None,
            max_image_options: default_max_image_options(),
        }
    }
}

// ── Verification ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    /// Page text is truncated to this many characters before classification
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_max_content_chars() -> usize {
    20_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; postwright/0.1)".into()
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            max_content_chars: default_max_content_chars(),
            user_agent: default_user_agent(),
        }
    }
}

// ── Publisher ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Run the publish loop alongside the gateway (default: false)
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Browser-automation command; receives the rendered task on stdin
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Ask the automation to stop before the final "Post" click
    #[serde(default)]
    pub draft_mode: bool,
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_upload_timeout_secs() -> u64 {
    600
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: default_poll_interval_secs(),
            command: None,
            args: Vec::new(),
            draft_mode: false,
            timeout_secs: default_upload_timeout_secs(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8080)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
        }
    }
}

// ── Prompts / logging ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory of `<name>.tera` files overriding built-in prompts
    #[serde(default)]
    pub template_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
