//! Configuration management for the knowledge-base assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.kbase/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.kbase/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .kbase/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Text-generation provider ("ollama", "gemini")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// Embedding provider ("ollama", "mock")
    pub embedding_provider: String,

    /// API key override for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Provider configurations
    pub llm: Option<LlmConfig>,

    /// Ranking and candidate-selection knobs
    pub retrieval: RetrievalSettings,

    /// Sampling parameters and deadline for the generation call
    pub generation: GenerationSettings,

    /// Embedding vector shape and deadline
    pub embedding: EmbeddingSettings,
}

/// Provider section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider")]
    pub active_embedding_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Similarity ranking knobs.
///
/// The defaults are fixed product constants; they are exposed as
/// configuration, not tuned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Matches must score strictly above this cosine similarity
    pub min_similarity: f32,

    /// Maximum number of matches handed to the context assembler
    pub top_k: usize,

    /// Documents with shorter content are never candidates
    pub min_content_chars: usize,

    /// Only this many leading characters of a document are embedded
    pub embedding_input_chars: usize,

    /// Upper bound on concurrent document embedding calls
    pub concurrency: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            min_similarity: 0.48,
            top_k: 4,
            min_content_chars: 30,
            embedding_input_chars: 1800,
            concurrency: 4,
        }
    }
}

/// Sampling parameters for the grounded generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.25,
            max_output_tokens: 900,
            top_p: 0.92,
            timeout_secs: 60,
        }
    }
}

/// Embedding shape and deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub normalize: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimensions: 384,
            timeout_secs: 30,
            normalize: true,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    generation: Option<GenerationSettings>,
    embedding: Option<EmbeddingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// Generation providers this build knows how to talk to.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Embedding providers this build knows how to load.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "mock"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            embedding_provider: "ollama".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Environment variables:
    /// - `KBASE_WORKSPACE`: Override workspace path
    /// - `KBASE_CONFIG`: Path to config file
    /// - `KBASE_PROVIDER`: Generation provider
    /// - `KBASE_MODEL`: Generation model identifier
    /// - `KBASE_EMBEDDING_PROVIDER`: Embedding provider
    /// - `KBASE_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use kbase_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `KBASE_WORKSPACE` and `KBASE_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var("KBASE_WORKSPACE").ok().map(PathBuf::from)) {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("KBASE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".kbase/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("KBASE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("KBASE_MODEL") {
            config.model = model;
        }

        if let Ok(provider) = std::env::var("KBASE_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }

        config.api_key = std::env::var("KBASE_API_KEY").ok();
        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, config_file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            result.embedding_provider = llm.active_embedding_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::Gemini { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            // A bare provider switch falls back to that provider's default model
            if self.provider != provider {
                self.model = default_model_for(&provider).to_string();
            }
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .kbase directory.
    pub fn kbase_dir(&self) -> PathBuf {
        self.workspace.join(".kbase")
    }

    /// Path of the SQLite database holding documents and messages.
    pub fn database_path(&self) -> PathBuf {
        self.kbase_dir().join("kbase.db")
    }

    /// Directory that may hold prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.kbase_dir().join("prompts")
    }

    /// Ensure the .kbase directory exists.
    pub fn ensure_kbase_dir(&self) -> AppResult<()> {
        let dir = self.kbase_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .kbase directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider's configuration block.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Endpoint configured for a provider, if any.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint().map(str::to_string))
    }

    /// Embedding model configured for the embedding provider.
    pub fn embedding_model(&self) -> String {
        match self.get_provider_config(&self.embedding_provider) {
            Some(ProviderConfig::Ollama {
                embedding_model: Some(model),
                ..
            }) => model,
            _ => default_embedding_model_for(&self.embedding_provider).to_string(),
        }
    }

    /// Resolve the API key for a provider.
    ///
    /// `KBASE_API_KEY` wins, then the provider's `apiKeyEnv`, then the
    /// conventional variable for the provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = match self.get_provider_config(provider) {
            Some(ProviderConfig::Gemini { api_key_env, .. }) => Some(api_key_env),
            _ if provider == "gemini" => Some("GEMINI_API_KEY".to_string()),
            _ => None,
        };

        env_var.and_then(|var| std::env::var(var).ok())
    }

    /// Validate configuration for the active providers.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.provider == "gemini" && self.resolve_api_key("gemini").is_none() {
            return Err(AppError::Config("Gemini API key missing".to_string()));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be at least 1".to_string()));
        }

        if self.retrieval.concurrency == 0 {
            return Err(AppError::Config(
                "retrieval.concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default generation model for a provider.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "gemini" => "gemini-2.5-flash",
        _ => "llama3.2",
    }
}

/// Default embedding model for an embedding provider.
pub fn default_embedding_model_for(provider: &str) -> &'static str {
    match provider {
        "mock" => "trigram-v1",
        _ => "all-minilm",
    }
}
