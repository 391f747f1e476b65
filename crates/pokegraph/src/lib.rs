pub mod cli;
pub mod queries;
pub mod writer;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use pokegraph_config::{
    PokegraphConfig, config_path, ensure_workspace_config, load_workspace_config, resolve_path,
    validate_config,
};
use pokegraph_store::{GraphStore, open_graph_store};

use crate::cli::{BuildArgs, Cli, Commands, QueryArgs};
use crate::queries::{QueryParams, run_queries, write_report};
use crate::writer::{Sources, build_graph, load_sources};

/// Opens the graph store for one run.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(
        &self,
        workspace: &Path,
        config: &PokegraphConfig,
    ) -> Result<Box<dyn GraphStore>>;
}

/// Opens the backend named in `graph.backend`.
pub struct ConfiguredStore;

#[async_trait]
impl StoreOpener for ConfiguredStore {
    async fn open(
        &self,
        workspace: &Path,
        config: &PokegraphConfig,
    ) -> Result<Box<dyn GraphStore>> {
        let store = open_graph_store(workspace, &config.graph, config.build.write_mode)
            .await
            .with_context(|| {
                format!(
                    "failed to open {} graph store",
                    config.graph.backend.as_str()
                )
            })?;
        Ok(store)
    }
}

/// Resolves the workspace, applies config and flags, then runs the chosen
/// subcommand. Query results go to `out`; diagnostics go through `tracing`.
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    run_with(cli, &ConfiguredStore, out).await
}

/// Like [`run`], with the store supplied by `opener`. The store is opened at
/// most once per call, after the source files have loaded.
pub async fn run_with(cli: Cli, opener: &dyn StoreOpener, out: &mut dyn Write) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let command = cli.command_or_default();
    // query only reads the graph, so it leaves the workspace untouched
    let loaded = match command {
        Commands::Query(_) => load_workspace_config(&workspace),
        Commands::Build(_) | Commands::Run(_) => ensure_workspace_config(&workspace),
    };
    let mut config = loaded.with_context(|| {
        format!(
            "failed to load workspace config at {}",
            config_path(&workspace).display()
        )
    })?;
    cli.apply_overrides(&mut config);
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "{}", warning.message);
    }

    match command {
        Commands::Build(args) => {
            let sources = prepare_build(&workspace, &mut config, &args)?;
            let store = open_store(opener, &workspace, &config).await?;
            build(store.as_ref(), &config, &sources).await
        }
        Commands::Query(args) => {
            let store = open_store(opener, &workspace, &config).await?;
            query(store.as_ref(), &args, out).await
        }
        Commands::Run(args) => {
            let sources = prepare_build(&workspace, &mut config, &args.build)?;
            let store = open_store(opener, &workspace, &config).await?;
            build(store.as_ref(), &config, &sources).await?;
            query(store.as_ref(), &args.query, out).await
        }
    }
}

fn prepare_build(
    workspace: &Path,
    config: &mut PokegraphConfig,
    args: &BuildArgs,
) -> Result<Sources> {
    if let Some(write_mode) = args.write_mode {
        config.build.write_mode = write_mode;
    }
    let species_path = source_path(workspace, args.species.as_ref(), &config.sources.species);
    let moves_path = source_path(workspace, args.moves.as_ref(), &config.sources.moves);

    load_sources(&species_path, &moves_path)
}

async fn build(store: &dyn GraphStore, config: &PokegraphConfig, sources: &Sources) -> Result<()> {
    let summary = build_graph(store, &sources.species, &sources.moves)
        .await
        .context("graph build failed")?;
    tracing::info!(
        write_mode = config.build.write_mode.as_str(),
        species = summary.species,
        evolutions = summary.evolutions,
        effectiveness = summary.effectiveness,
        moves = summary.moves,
        skills = summary.skills,
        "graph build finished"
    );
    log_stats(store).await;

    Ok(())
}

async fn query(store: &dyn GraphStore, args: &QueryArgs, out: &mut dyn Write) -> Result<()> {
    let params = QueryParams::default();

    let report = run_queries(store, &params).await?;
    write_report(&report, args.output, out).context("failed to write query results")?;
    out.flush().context("failed to flush query results")?;

    Ok(())
}

async fn open_store(
    opener: &dyn StoreOpener,
    workspace: &Path,
    config: &PokegraphConfig,
) -> Result<Box<dyn GraphStore>> {
    let store = opener.open(workspace, config).await?;
    tracing::debug!(
        backend = store.backend().as_str(),
        write_mode = store.write_mode().as_str(),
        "graph store opened"
    );
    Ok(store)
}

/// Flag paths are taken as given; config paths resolve against the workspace.
fn source_path(workspace: &Path, flag: Option<&PathBuf>, configured: &str) -> PathBuf {
    match flag {
        Some(path) => path.clone(),
        None => resolve_path(workspace, configured),
    }
}

async fn log_stats(store: &dyn GraphStore) {
    match store.stats().await {
        Ok(stats) => tracing::info!(
            species_nodes = stats.species_nodes,
            move_nodes = stats.move_nodes,
            evolution_edges = stats.evolution_edges,
            skill_edges = stats.skill_edges,
            effectiveness_edges = stats.effectiveness_edges,
            "graph totals"
        ),
        Err(err) => tracing::warn!(error = %err, "failed to read graph totals"),
    }
}
