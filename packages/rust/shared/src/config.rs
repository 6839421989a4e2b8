//! Application configuration for ProfitGraph.
//!
//! User config lives at `~/.profitgraph/profitgraph.toml`.
//! Secrets never live in the file, only the *names* of the environment
//! variables that hold them. CLI flags override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProfitGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "profitgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".profitgraph";

// ---------------------------------------------------------------------------
// Config structs (matching profitgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Gemini settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Perplexity Sonar settings.
    #[serde(default)]
    pub sonar: SonarConfig,

    /// Neo4j knowledge graph settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for transcripts, briefs, plans, and the local index.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Caption languages to try, in order.
    #[serde(default = "default_caption_languages")]
    pub caption_languages: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            caption_languages: default_caption_languages(),
        }
    }
}

impl DefaultsConfig {
    /// The output root with a leading `~` expanded to the home directory.
    pub fn output_path(&self) -> Result<PathBuf> {
        expand_home(&self.output_dir)
    }
}

fn default_output_dir() -> String {
    "~/profitgraph".into()
}
fn default_caption_languages() -> Vec<String> {
    vec!["en".into()]
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used by the agent pass (Strategist, Architect, Refiner, Oracle).
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Model used for long-form plan generation.
    #[serde(default = "default_plan_model")]
    pub plan_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            plan_model: default_plan_model(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".into()
}
fn default_plan_model() -> String {
    "gemini-2.5-flash".into()
}

/// `[sonar]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SonarConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_sonar_key_env")]
    pub api_key_env: String,

    /// Perplexity model for research queries.
    #[serde(default = "default_sonar_model")]
    pub model: String,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_sonar_key_env(),
            model: default_sonar_model(),
        }
    }
}

fn default_sonar_key_env() -> String {
    "SONAR_API_KEY".into()
}
fn default_sonar_model() -> String {
    "sonar".into()
}

/// `[graph]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Env var holding the Neo4j HTTP endpoint (e.g. `https://host:7473`).
    #[serde(default = "default_graph_uri_env")]
    pub uri_env: String,

    /// Env var holding the Neo4j user.
    #[serde(default = "default_graph_user_env")]
    pub user_env: String,

    /// Env var holding the Neo4j password.
    #[serde(default = "default_graph_password_env")]
    pub password_env: String,

    /// Target database name.
    #[serde(default = "default_graph_database")]
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri_env: default_graph_uri_env(),
            user_env: default_graph_user_env(),
            password_env: default_graph_password_env(),
            database: default_graph_database(),
        }
    }
}

fn default_graph_uri_env() -> String {
    "NEO4J_URI".into()
}
fn default_graph_user_env() -> String {
    "NEO4J_USERNAME".into()
}
fn default_graph_password_env() -> String {
    "NEO4J_PASSWORD".into()
}
fn default_graph_database() -> String {
    "neo4j".into()
}

// ---------------------------------------------------------------------------
// Resolved graph credentials
// ---------------------------------------------------------------------------

/// Graph connection settings resolved from the environment at runtime.
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl GraphCredentials {
    /// Resolve credentials from the env vars named in `[graph]`.
    ///
    /// The user var falls back to `neo4j` when unset, matching the server
    /// default; URI and password are required.
    pub fn resolve(config: &GraphConfig) -> Result<Self> {
        let uri = std::env::var(&config.uri_env).map_err(|_| {
            ProfitGraphError::config(format!(
                "graph endpoint not found. Set the {} environment variable.",
                config.uri_env
            ))
        })?;
        let password = std::env::var(&config.password_env).map_err(|_| {
            ProfitGraphError::config(format!(
                "graph password not found. Set the {} environment variable.",
                config.password_env
            ))
        })?;
        let user = std::env::var(&config.user_env).unwrap_or_else(|_| "neo4j".into());

        Ok(Self {
            uri,
            user,
            password,
            database: config.database.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.profitgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProfitGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.profitgraph/profitgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProfitGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProfitGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProfitGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProfitGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProfitGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve an API key from the named environment variable.
pub fn resolve_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProfitGraphError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both agent API keys are available before starting a pipeline.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.gemini.api_key_env)?;
    resolve_api_key(&config.sonar.api_key_env)?;
    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ProfitGraphError::config("could not determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("SONAR_API_KEY"));
        assert!(toml_str.contains("NEO4J_URI"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.gemini.model, "gemini-2.0-flash-exp");
        assert_eq!(parsed.sonar.model, "sonar");
        assert_eq!(parsed.graph.database, "neo4j");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/profitgraph"

[gemini]
model = "gemini-2.0-pro"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir, "/tmp/profitgraph");
        assert_eq!(config.gemini.model, "gemini-2.0-pro");
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.defaults.caption_languages, vec!["en".to_string()]);
    }

    #[test]
    fn api_key_validation() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_api_key("PG_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn graph_credentials_require_uri_and_password() {
        let config = GraphConfig {
            uri_env: "PG_TEST_NO_URI_98765".into(),
            user_env: "PG_TEST_NO_USER_98765".into(),
            password_env: "PG_TEST_NO_PASSWORD_98765".into(),
            database: "neo4j".into(),
        };
        let result = GraphCredentials::resolve(&config);
        assert!(result.is_err());
    }

    #[test]
    fn output_path_expands_home() {
        let defaults = DefaultsConfig::default();
        let path = defaults.output_path().expect("output path");
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("profitgraph"));
    }

    #[test]
    fn output_path_keeps_absolute() {
        let defaults = DefaultsConfig {
            output_dir: "/data/profitgraph".into(),
            ..Default::default()
        };
        let path = defaults.output_path().unwrap();
        assert_eq!(path, PathBuf::from("/data/profitgraph"));
    }
}
