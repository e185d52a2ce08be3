//! Configuration management for ResearchX.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.researchx/config.yaml)
//!
//! The configuration is workspace-centric: conversations, checkpoints, prompt
//! overrides and local knowledge bases all live under `.researchx/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".researchx";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .researchx/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Research policy (refinement budget, source order, grading target)
    pub research: ResearchConfig,

    /// Retrieval backend settings
    pub sources: SourcesConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions endpoint
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Request timeout in seconds, if any.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            Self::OpenAI { .. } => None,
            Self::Ollama { timeout, .. } => *timeout,
        }
    }
}

/// Research policy settings (`research:` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchConfig {
    /// Refinements allowed per source per turn
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,

    /// Order in which untried sources are searched
    #[serde(default = "default_source_order")]
    pub source_order: Vec<String>,

    /// Text passages are graded against: "original-question" or "working-query"
    #[serde(default = "default_grade_against")]
    pub grade_against: String,

    /// Answer given when no evidence was gathered
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_max_refinements() -> u32 {
    2
}

fn default_source_order() -> Vec<String> {
    vec![
        "general-web".to_string(),
        "academic-index".to_string(),
        "local-knowledge-base".to_string(),
    ]
}

fn default_grade_against() -> String {
    "original-question".to_string()
}

fn default_fallback_answer() -> String {
    "After a thorough search, I could not find any relevant documents to answer your question."
        .to_string()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_refinements: default_max_refinements(),
            source_order: default_source_order(),
            grade_against: default_grade_against(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

/// Retrieval backend settings (`sources:` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub web: WebSourceConfig,

    #[serde(default)]
    pub academic: AcademicSourceConfig,

    #[serde(default)]
    pub knowledge: KnowledgeSourceConfig,
}

/// General web search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSourceConfig {
    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_web_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_web_endpoint() -> String {
    "https://api.tavily.com".to_string()
}

fn default_web_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> u32 {
    3
}

impl Default for WebSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_web_endpoint(),
            api_key_env: default_web_key_env(),
            max_results: default_max_results(),
        }
    }
}

/// Academic paper index backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSourceConfig {
    #[serde(default = "default_academic_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_academic_endpoint() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

impl Default for AcademicSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_academic_endpoint(),
            max_results: default_max_results(),
        }
    }
}

/// Local knowledge base backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSourceConfig {
    #[serde(default = "default_base_name")]
    pub base_name: String,

    #[serde(default = "default_max_results")]
    pub top_k: u32,

    /// Minimum cosine similarity for a chunk to be returned
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
}

fn default_base_name() -> String {
    "default".to_string()
}

fn default_min_score() -> f32 {
    0.5
}

fn default_chunk_size() -> u32 {
    512
}

fn default_chunk_overlap() -> u32 {
    64
}

impl Default for KnowledgeSourceConfig {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            top_k: default_max_results(),
            min_score: default_min_score(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    research: Option<ResearchConfig>,
    sources: Option<SourcesConfig>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            llm: None,
            research: ResearchConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `RESEARCHX_WORKSPACE`: Override workspace path
    /// - `RESEARCHX_CONFIG`: Path to config file
    /// - `RESEARCHX_PROVIDER`: LLM provider
    /// - `RESEARCHX_MODEL`: Model identifier
    /// - `RESEARCHX_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use researchx_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RESEARCHX_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RESEARCHX_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RESEARCHX_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RESEARCHX_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("RESEARCHX_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

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
                result.json_logs = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(research) = config_file.research {
            result.research = research;
        }

        if let Some(sources) = config_file.sources {
            result.sources = sources;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the YAML file.
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

    /// Get the path to the .researchx directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .researchx directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// SQLite file holding conversations and checkpoints.
    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("research.sqlite")
    }

    /// SQLite file holding the local knowledge base chunks.
    pub fn knowledge_path(&self) -> PathBuf {
        self.state_dir()
            .join("knowledge")
            .join(format!("{}.sqlite", self.sources.knowledge.base_name))
    }

    /// Get a provider's configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve API key for a provider.
    ///
    /// `RESEARCHX_API_KEY` wins, then the provider's `apiKeyEnv` variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["openai", "ollama"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if self.api_key.is_none() && std::env::var(api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        if self.research.source_order.is_empty() {
            return Err(AppError::Config(
                "research.sourceOrder cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.research.max_refinements, 2);
        assert_eq!(config.research.grade_against, "original-question");
        assert_eq!(config.sources.knowledge.top_k, 3);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_state_paths() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(".researchx"));
        assert!(config.database_path().ends_with(".researchx/research.sqlite"));
        assert!(config
            .knowledge_path()
            .ends_with(".researchx/knowledge/default.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: qwen2.5
logging:
  level: warn
  json: true
research:
  maxRefinements: 3
  gradeAgainst: working-query
sources:
  knowledge:
    baseName: papers
    minScore: 0.4
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.model, "qwen2.5");
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.json_logs);
        assert_eq!(merged.research.max_refinements, 3);
        assert_eq!(merged.research.grade_against, "working-query");
        // Unset fields keep their defaults
        assert_eq!(merged.research.source_order.len(), 3);
        assert_eq!(merged.sources.knowledge.base_name, "papers");
        assert_eq!(merged.sources.knowledge.top_k, 3);
        assert_eq!(merged.sources.web.max_results, 3);
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_openai_requires_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig::OpenAI {
                api_key_env: "RESEARCHX_TEST_MISSING_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                endpoint: None,
            },
        );
        config.llm = Some(LlmConfig {
            active_provider: "openai".to_string(),
            providers,
        });

        assert!(config.validate().is_err());

        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_api_key("openai").as_deref(), Some("sk-test"));
    }
}
