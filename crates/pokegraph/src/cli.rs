use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pokegraph_config::{GraphBackendKind, PokegraphConfig, WriteMode};

use crate::queries::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct BuildArgs {
    #[arg(long, help = "Species JSON file (overrides sources.species)")]
    pub species: Option<PathBuf>,

    #[arg(long, help = "Move CSV file (overrides sources.moves)")]
    pub moves: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_write_mode,
        help = "Write mode: create (always insert) or merge (upsert on key)"
    )]
    pub write_mode: Option<WriteMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct QueryArgs {
    #[arg(
        long,
        default_value = "text",
        value_parser = parse_output_format,
        help = "Result output format: text or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Load the source files and write the species graph
    Build(BuildArgs),
    /// Run the analytical queries against an existing graph
    Query(QueryArgs),
    /// Build the graph, then run the queries
    Run(RunArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Pokémon species graph builder")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .pokegraph/config.toml and the source files"
    )]
    pub workspace: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[arg(long, global = true, value_parser = parse_backend, help = "Graph backend: neo4j or sqlite")]
    pub backend: Option<GraphBackendKind>,

    #[arg(long, global = true, help = "Neo4j connection URI")]
    pub uri: Option<String>,

    #[arg(long, global = true, help = "Neo4j user")]
    pub user: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Environment variable holding the Neo4j password"
    )]
    pub password_env: Option<String>,

    #[arg(long, global = true, help = "SQLite graph file for the sqlite backend")]
    pub sqlite_path: Option<String>,
}

impl Cli {
    /// The subcommand to run; a bare invocation builds and then queries.
    pub fn command_or_default(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    pub fn apply_overrides(&self, config: &mut PokegraphConfig) {
        if let Some(backend) = self.backend {
            config.graph.backend = backend;
        }
        if let Some(uri) = &self.uri {
            config.graph.uri = uri.trim().to_owned();
        }
        if let Some(user) = &self.user {
            config.graph.user = user.trim().to_owned();
        }
        if let Some(password_env) = &self.password_env {
            config.graph.password_env = password_env.trim().to_owned();
        }
        if let Some(sqlite_path) = &self.sqlite_path {
            config.graph.sqlite_path = sqlite_path.trim().to_owned();
        }
    }
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_backend(value: &str) -> Result<GraphBackendKind, String> {
    value.parse()
}

fn parse_write_mode(value: &str) -> Result<WriteMode, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}
