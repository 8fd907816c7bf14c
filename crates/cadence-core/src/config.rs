use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CadenceError, Result};

/// Top-level Cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub model: ModelConfig,
    /// Model used by the memory subgraph. Defaults to `model` at temperature 0.1.
    #[serde(default)]
    pub memory_model: Option<ModelConfig>,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
}

/// Run-loop bounds and ToolPort timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    /// Warn after this many consecutive steps without an effector.
    #[serde(default = "default_stall_warning_steps")]
    pub stall_warning_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            llm_timeout_secs: default_llm_timeout(),
            search_timeout_secs: default_search_timeout(),
            stall_warning_steps: default_stall_warning_steps(),
        }
    }
}

fn default_max_steps() -> usize { 40 }
fn default_llm_timeout() -> u64 { 120 }
fn default_search_timeout() -> u64 { 60 }
fn default_stall_warning_steps() -> usize { 8 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
            extra_headers: HashMap::new(),
        }
    }

    /// Whether this provider runs locally and needs no credential.
    pub fn is_local(&self) -> bool {
        matches!(self.provider.as_str(), "ollama" | "vllm" | "lmstudio")
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Web search backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name for chat-style search providers (perplexity).
    #[serde(default = "default_search_model")]
    pub model: String,
    /// Result count for snippet-style search providers (tavily).
    #[serde(default = "default_search_max_results")]
    pub max_results: u32,
}

fn default_search_provider() -> String { "perplexity".to_string() }
fn default_search_model() -> String { "sonar".to_string() }
fn default_search_max_results() -> u32 { 5 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| CadenceError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| CadenceError::Config(e.to_string()))
    }

    /// Build a config from well-known environment variables.
    ///
    /// Uses OpenAI when `OPENAI_API_KEY` is set and a local Ollama otherwise.
    /// Search prefers Perplexity, then Tavily.
    pub fn from_env() -> Self {
        let mut model = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                let mut m = ModelConfig::new("openai", "gpt-4o");
                m.api_key = Some(key);
                m
            }
            Err(_) => ModelConfig::new("ollama", "llama3.2"),
        };
        if let Ok(model_id) = std::env::var("CADENCE_MODEL") {
            model.model_id = model_id;
        }

        let search = if let Ok(key) = std::env::var("PERPLEXITY_API_KEY") {
            Some(SearchConfig::new("perplexity", key))
        } else {
            std::env::var("TAVILY_API_KEY")
                .ok()
                .map(|key| SearchConfig::new("tavily", key))
        };

        Self {
            engine: EngineConfig::default(),
            model,
            memory_model: None,
            fallback_models: Vec::new(),
            search,
        }
    }

    /// Load `path` if it exists, otherwise fall back to [`AppConfig::from_env`].
    pub fn load_or_env(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::from_env())
        }
    }

    /// Model config for the memory subgraph.
    pub fn memory_model(&self) -> ModelConfig {
        self.memory_model.clone().unwrap_or_else(|| {
            let mut m = self.model.clone();
            m.temperature = 0.1;
            m
        })
    }

    /// Check that every ToolPort has what it needs to be constructed.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_steps == 0 {
            return Err(CadenceError::Config("engine.max_steps must be at least 1".into()));
        }
        for model in std::iter::once(&self.model)
            .chain(self.memory_model.iter())
            .chain(self.fallback_models.iter())
        {
            if model.api_key.as_deref().map_or(true, str::is_empty) && !model.is_local() {
                return Err(CadenceError::Config(format!(
                    "model '{}' (provider '{}') has no api_key",
                    model.model_id, model.provider
                )));
            }
        }
        match &self.search {
            None => Err(CadenceError::Config(
                "no [search] section; set PERPLEXITY_API_KEY or TAVILY_API_KEY".into(),
            )),
            Some(s) if s.api_key.as_deref().map_or(true, str::is_empty) => Err(
                CadenceError::Config(format!("search provider '{}' has no api_key", s.provider)),
            ),
            Some(s) if !matches!(s.provider.as_str(), "perplexity" | "tavily") => Err(
                CadenceError::Config(format!("unknown search provider '{}'", s.provider)),
            ),
            Some(_) => Ok(()),
        }
    }

    /// A copy with every credential replaced by a mask, for display.
    pub fn masked(&self) -> Self {
        let mut c = self.clone();
        let mask = |key: &mut Option<String>| {
            if let Some(k) = key.as_mut() {
                *k = mask_secret(k);
            }
        };
        mask(&mut c.model.api_key);
        if let Some(m) = c.memory_model.as_mut() {
            mask(&mut m.api_key);
        }
        for m in &mut c.fallback_models {
            mask(&mut m.api_key);
        }
        if let Some(s) = c.search.as_mut() {
            mask(&mut s.api_key);
        }
        c
    }
}

impl SearchConfig {
    pub fn new(provider: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: Some(api_key.into()),
            base_url: None,
            model: default_search_model(),
            max_results: default_search_max_results(),
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Default config path: `./cadence.toml`, else `~/.cadence/config.toml`.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from("cadence.toml");
    if local.exists() {
        return local;
    }
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".cadence").join("config.toml"))
        .filter(|p| p.exists())
        .unwrap_or(local)
}
