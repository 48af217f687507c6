use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TasksmithError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub models: ModelsConfig,
    pub search: SearchConfig,
    pub run: RunConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Language-model backends the crate can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Mistral,
    Anthropic,
}

impl ProviderKind {
    /// Environment variable consulted when no key is set in config
    pub fn default_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Mistral => "MISTRAL_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// The provider's "large" model, used for any role without an explicit model
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Mistral => "mistral-large-latest",
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout_ms: 120000,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-role model selection; unset roles fall back to the provider's large model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub orchestrator: Option<String>,
    pub sub_agent: Option<String>,
    pub refiner: Option<String>,
}

impl ModelsConfig {
    pub fn orchestrator_model(&self, provider: ProviderKind) -> String {
        pick_model(&self.orchestrator, provider)
    }

    pub fn sub_agent_model(&self, provider: ProviderKind) -> String {
        pick_model(&self.sub_agent, provider)
    }

    pub fn refiner_model(&self, provider: ProviderKind) -> String {
        pick_model(&self.refiner, provider)
    }
}

fn pick_model(model: &Option<String>, provider: ProviderKind) -> String {
    model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub max_results: usize,
    pub timeout_ms: u64,
    pub search_depth: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            api_key_env: "TAVILY_API_KEY".to_string(),
            base_url: None,
            max_results: 5,
            timeout_ms: 30000,
            search_depth: "basic".to_string(),
        }
    }
}

/// When supporting file content is handed to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileContentPolicy {
    #[default]
    FirstCall,
    EveryCall,
}

/// What to do with orchestrator text that follows the completion marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemainderPolicy {
    #[default]
    Discard,
    Execute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_iterations: u32,
    pub file_content: FileContentPolicy,
    pub on_complete_remainder: RemainderPolicy,
    pub continue_truncated: bool,
    pub share_history: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            file_content: FileContentPolicy::default(),
            on_complete_remainder: RemainderPolicy::default(),
            continue_truncated: true,
            share_history: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub exchange_log: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            exchange_log: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            models: ModelsConfig::default(),
            search: SearchConfig::default(),
            run: RunConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // An explicit path must load; the implicit locations are best-effort
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.run.max_iterations == 0 {
            return Err(TasksmithError::Configuration(
                "run.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Resolve both secrets from the process environment
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::resolve_with(self, |name| std::env::var(name).ok())
    }
}

/// Secrets resolved once at startup and handed to client constructors
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub search_api_key: Option<String>,
}

impl Credentials {
    /// Resolve secrets using `lookup` for environment access.
    ///
    /// A missing language-model key is fatal; a missing search key only
    /// disables search.
    pub fn resolve_with<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_env = config.llm.key_env();
        let llm_api_key = resolve_secret(config.llm.api_key.as_deref(), key_env, &lookup).ok_or_else(|| {
            TasksmithError::Configuration(format!(
                "{:?} API key must be provided in config (llm.api_key) or the {} environment variable",
                config.llm.provider, key_env
            ))
        })?;

        let search_api_key = resolve_secret(config.search.api_key.as_deref(), &config.search.api_key_env, &lookup);

        Ok(Self {
            llm_api_key,
            search_api_key,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("search_api_key", &self.search_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Explicit value first, then the named environment variable. Empty counts as unset.
pub fn resolve_secret<F>(explicit: Option<&str>, env_var: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| lookup(env_var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::Mistral);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.run.max_iterations, 5);
        assert_eq!(config.run.file_content, FileContentPolicy::FirstCall);
        assert_eq!(config.run.on_complete_remainder, RemainderPolicy::Discard);
        assert_eq!(config.search.max_results, 5);
        assert!(!config.search.enabled);
    }

    #[test]
    fn test_models_default_to_large_model() {
        let models = ModelsConfig::default();
        assert_eq!(models.orchestrator_model(ProviderKind::Mistral), "mistral-large-latest");
        assert_eq!(models.sub_agent_model(ProviderKind::Mistral), "mistral-large-latest");
        assert_eq!(models.refiner_model(ProviderKind::Mistral), "mistral-large-latest");
    }

    #[test]
    fn test_models_can_differ_per_role() {
        let models = ModelsConfig {
            orchestrator: Some("mistral-large-latest".to_string()),
            sub_agent: Some("mistral-small-latest".to_string()),
            refiner: None,
        };
        assert_eq!(models.sub_agent_model(ProviderKind::Mistral), "mistral-small-latest");
        assert_eq!(models.refiner_model(ProviderKind::Anthropic), "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  provider: anthropic
run:
  max_iterations: 3
  file_content: every-call
  on_complete_remainder: execute
search:
  enabled: true
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(config.llm.key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(config.llm.timeout_ms, 120000);
        assert_eq!(config.run.max_iterations, 3);
        assert_eq!(config.run.file_content, FileContentPolicy::EveryCall);
        assert_eq!(config.run.on_complete_remainder, RemainderPolicy::Execute);
        assert!(config.search.enabled);
        assert_eq!(config.search.api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = Config::from_yaml("run:\n  max_iterations: 0\n").unwrap_err();
        assert!(matches!(err, TasksmithError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tasksmith.yml");
        fs::write(&path, "models:\n  refiner: mistral-medium-latest\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.models.refiner.as_deref(), Some("mistral-medium-latest"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/tasksmith.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_resolve_secret_config_wins() {
        let lookup = env(&[("MISTRAL_API_KEY", "from-env")]);
        assert_eq!(
            resolve_secret(Some("from-config"), "MISTRAL_API_KEY", &lookup).as_deref(),
            Some("from-config")
        );
    }

    #[test]
    fn test_resolve_secret_falls_back_to_env() {
        let lookup = env(&[("MISTRAL_API_KEY", "from-env")]);
        assert_eq!(resolve_secret(None, "MISTRAL_API_KEY", &lookup).as_deref(), Some("from-env"));
        assert_eq!(resolve_secret(Some("  "), "MISTRAL_API_KEY", &lookup).as_deref(), Some("from-env"));
    }

    #[test]
    fn test_resolve_secret_absent() {
        let lookup = env(&[("MISTRAL_API_KEY", "")]);
        assert!(resolve_secret(None, "MISTRAL_API_KEY", &lookup).is_none());
    }

    #[test]
    fn test_credentials_missing_llm_key_is_fatal() {
        let err = Credentials::resolve_with(&Config::default(), env(&[])).unwrap_err();
        assert!(matches!(err, TasksmithError::Configuration(_)));
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
    }

    #[test]
    fn test_credentials_missing_search_key_is_soft() {
        let creds = Credentials::resolve_with(&Config::default(), env(&[("MISTRAL_API_KEY", "k")])).unwrap();
        assert_eq!(creds.llm_api_key, "k");
        assert!(creds.search_api_key.is_none());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials::resolve_with(
            &Config::default(),
            env(&[("MISTRAL_API_KEY", "secret-llm"), ("TAVILY_API_KEY", "secret-search")]),
        )
        .unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-llm"));
        assert!(!debug.contains("secret-search"));
    }
}
