use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const POKEGRAPH_DIR_NAME: &str = ".pokegraph";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_NEO4J_URI: &str = "bolt://127.0.0.1:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_PASSWORD_ENV: &str = "NEO4J_PASSWORD";
pub const DEFAULT_SQLITE_PATH: &str = ".pokegraph/graph.sqlite";
pub const DEFAULT_SPECIES_PATH: &str = "pokemon_data.json";
pub const DEFAULT_MOVES_PATH: &str = "moves.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackendKind {
    #[default]
    Neo4j,
    Sqlite,
}

impl GraphBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neo4j => "neo4j",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for GraphBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "neo4j" => Ok(Self::Neo4j),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!(
                "invalid backend '{other}', expected one of: neo4j, sqlite"
            )),
        }
    }
}

/// How node and edge writes treat rows that already exist in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Always insert. Re-running a build duplicates nodes and edges.
    #[default]
    Create,
    /// Upsert nodes on their key and merge edges.
    Merge,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Merge => "merge",
        }
    }
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "create" => Ok(Self::Create),
            "merge" => Ok(Self::Merge),
            other => Err(format!(
                "invalid write mode '{other}', expected one of: create, merge"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PokegraphConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub backend: GraphBackendKind,
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackendKind::Neo4j,
            uri: default_uri(),
            user: default_user(),
            password_env: default_password_env(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_species_path")]
    pub species: String,
    #[serde(default = "default_moves_path")]
    pub moves: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            species: default_species_path(),
            moves: default_moves_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    #[serde(default)]
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn pokegraph_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(POKEGRAPH_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    pokegraph_dir(workspace_root).join(CONFIG_FILE_NAME)
}

/// Resolves a configured path against the workspace root unless it is already absolute.
pub fn resolve_path(workspace_root: impl AsRef<Path>, configured: &str) -> PathBuf {
    let configured = Path::new(configured);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workspace_root.as_ref().join(configured)
    }
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<PokegraphConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(PokegraphConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PokegraphConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<PokegraphConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(pokegraph_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = PokegraphConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &PokegraphConfig) -> Vec<ConfigWarning> {
    validate_config_with_env(config, |name| std::env::var_os(name).is_some())
}

fn validate_config_with_env(
    config: &PokegraphConfig,
    env_is_set: impl Fn(&str) -> bool,
) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let graph = &config.graph;

    match graph.backend {
        GraphBackendKind::Neo4j => {
            if graph.uri.is_empty() {
                warnings.push(ConfigWarning {
                    code: "neo4j_uri_empty",
                    message: "graph.uri is empty; the neo4j backend cannot connect".to_owned(),
                });
            }
            if graph.user.is_empty() {
                warnings.push(ConfigWarning {
                    code: "neo4j_user_empty",
                    message: "graph.user is empty; the neo4j backend cannot authenticate"
                        .to_owned(),
                });
            }
            if !env_is_set(&graph.password_env) {
                warnings.push(ConfigWarning {
                    code: "neo4j_password_env_unset",
                    message: format!(
                        "environment variable {} is not set; neo4j authentication will fail",
                        graph.password_env
                    ),
                });
            }
        }
        GraphBackendKind::Sqlite => {
            if graph.uri != DEFAULT_NEO4J_URI {
                warnings.push(ConfigWarning {
                    code: "sqlite_ignores_uri",
                    message: format!(
                        "graph.uri '{}' is ignored by the sqlite backend",
                        graph.uri
                    ),
                });
            }
        }
    }

    warnings
}

fn default_uri() -> String {
    DEFAULT_NEO4J_URI.to_owned()
}

fn default_user() -> String {
    DEFAULT_NEO4J_USER.to_owned()
}

fn default_password_env() -> String {
    DEFAULT_PASSWORD_ENV.to_owned()
}

fn default_sqlite_path() -> String {
    DEFAULT_SQLITE_PATH.to_owned()
}

fn default_species_path() -> String {
    DEFAULT_SPECIES_PATH.to_owned()
}

fn default_moves_path() -> String {
    DEFAULT_MOVES_PATH.to_owned()
}

fn normalize_or(value: &str, fallback: impl FnOnce() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_config(mut config: PokegraphConfig) -> PokegraphConfig {
    config.graph.uri = config.graph.uri.trim().to_owned();
    config.graph.user = config.graph.user.trim().to_owned();
    config.graph.password_env = normalize_or(&config.graph.password_env, default_password_env);
    config.graph.sqlite_path = normalize_or(&config.graph.sqlite_path, default_sqlite_path);
    config.sources.species = normalize_or(&config.sources.species, default_species_path);
    config.sources.moves = normalize_or(&config.sources.moves, default_moves_path);
    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_workspace_config_creates_default_file() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let config = ensure_workspace_config(workspace).expect("ensure config");

        assert_eq!(config.graph.backend, GraphBackendKind::Neo4j);
        assert_eq!(config.graph.password_env, DEFAULT_PASSWORD_ENV);
        assert_eq!(config.build.write_mode, WriteMode::Create);
        assert!(config_path(workspace).exists());

        let content = fs::read_to_string(config_path(workspace)).expect("read config file");
        assert!(content.contains("[graph]"));
        assert!(content.contains("backend = \"neo4j\""));
        assert!(content.contains("write_mode = \"create\""));
    }

    #[test]
    fn load_workspace_config_parses_and_normalizes_values() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(pokegraph_dir(workspace)).expect("create .pokegraph");

        let raw = r#"
[graph]
backend = "sqlite"
uri = "  bolt://graph.internal:7687  "
password_env = "   "
sqlite_path = "data/graph.sqlite"

[sources]
species = " data/pokemon.json "

[build]
write_mode = "merge"
"#;
        fs::write(config_path(workspace), raw).expect("write config");

        let config = load_workspace_config(workspace).expect("load config");

        assert_eq!(config.graph.backend, GraphBackendKind::Sqlite);
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.user, DEFAULT_NEO4J_USER);
        assert_eq!(config.graph.password_env, DEFAULT_PASSWORD_ENV);
        assert_eq!(config.graph.sqlite_path, "data/graph.sqlite");
        assert_eq!(config.sources.species, "data/pokemon.json");
        assert_eq!(config.sources.moves, DEFAULT_MOVES_PATH);
        assert_eq!(config.build.write_mode, WriteMode::Merge);
    }

    #[test]
    fn load_workspace_config_rejects_unknown_write_mode() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(pokegraph_dir(workspace)).expect("create .pokegraph");
        fs::write(config_path(workspace), "[build]\nwrite_mode = \"upsert\"\n")
            .expect("write config");

        let err = load_workspace_config(workspace).expect_err("expected parse error");
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn validate_config_flags_missing_password_for_neo4j() {
        let config = PokegraphConfig::default();

        let warnings = validate_config_with_env(&config, |_| false);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "neo4j_password_env_unset");
        assert!(warnings[0].message.contains(DEFAULT_PASSWORD_ENV));

        let warnings = validate_config_with_env(&config, |_| true);
        assert!(warnings.is_empty());
    }

    #[test]
    fn validate_config_flags_uri_ignored_by_sqlite() {
        let mut config = PokegraphConfig::default();
        config.graph.backend = GraphBackendKind::Sqlite;
        assert!(validate_config_with_env(&config, |_| false).is_empty());

        config.graph.uri = "bolt://elsewhere:7687".to_owned();
        let warnings = validate_config_with_env(&config, |_| false);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "sqlite_ignores_uri");
    }

    #[test]
    fn resolve_path_keeps_absolute_and_joins_relative() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        assert_eq!(
            resolve_path(workspace, "moves.csv"),
            workspace.join("moves.csv")
        );
        let absolute = workspace.join("elsewhere.json");
        let absolute_str = absolute.to_string_lossy().to_string();
        assert_eq!(resolve_path(workspace, &absolute_str), absolute);
    }

    #[test]
    fn backend_and_write_mode_parse_from_str() {
        assert_eq!("sqlite".parse::<GraphBackendKind>(), Ok(GraphBackendKind::Sqlite));
        assert_eq!(" neo4j ".parse::<GraphBackendKind>(), Ok(GraphBackendKind::Neo4j));
        assert!("postgres".parse::<GraphBackendKind>().is_err());
        assert_eq!("merge".parse::<WriteMode>(), Ok(WriteMode::Merge));
        assert_eq!(WriteMode::Create.as_str(), "create");
    }
}
