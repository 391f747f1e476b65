use std::path::Path;

use anyhow::{Context, Result};
use pokegraph_core::{
    MoveRecord, SpeciesRecord, evolution_links, load_moves, load_species, matchup_pairs,
};
use pokegraph_store::GraphStore;

/// Counts of write operations issued during one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub species: usize,
    pub evolutions: usize,
    pub effectiveness: usize,
    pub moves: usize,
    pub skills: usize,
}

pub struct Sources {
    pub species: Vec<SpeciesRecord>,
    pub moves: Vec<MoveRecord>,
}

/// Loads both source files, failing before anything touches the graph.
pub fn load_sources(species_path: &Path, moves_path: &Path) -> Result<Sources> {
    let species = load_species(species_path).with_context(|| {
        format!(
            "failed to load species from {}",
            species_path.display()
        )
    })?;
    let moves = load_moves(moves_path)
        .with_context(|| format!("failed to load moves from {}", moves_path.display()))?;

    tracing::info!(
        species = species.len(),
        moves = moves.len(),
        "loaded source files"
    );

    Ok(Sources { species, moves })
}

/// Writes the whole graph: species, then evolutions, then the type matchup
/// fan-out, then each move followed by its skill edges.
///
/// Edges only match nodes that already exist, so the order matters. An
/// evolution or skill that names a missing species writes nothing.
pub async fn build_graph(
    store: &dyn GraphStore,
    species: &[SpeciesRecord],
    moves: &[MoveRecord],
) -> Result<BuildSummary> {
    store
        .ensure_schema()
        .await
        .context("failed to prepare graph schema")?;

    let mut summary = BuildSummary::default();

    for record in species {
        store
            .create_species(record)
            .await
            .with_context(|| format!("failed to write species {} ({})", record.id, record.name))?;
        summary.species += 1;
    }
    tracing::info!(count = summary.species, "wrote species nodes");

    for link in evolution_links(species) {
        store
            .create_evolution(link.from, link.to)
            .await
            .with_context(|| {
                format!("failed to write evolution {} -> {}", link.from, link.to)
            })?;
        summary.evolutions += 1;
    }
    tracing::info!(count = summary.evolutions, "wrote evolution edges");

    for (attacking, defending) in matchup_pairs() {
        store
            .create_effectiveness(attacking, defending)
            .await
            .with_context(|| {
                format!("failed to write effectiveness {attacking} -> {defending}")
            })?;
        summary.effectiveness += 1;
    }
    tracing::info!(
        pairs = summary.effectiveness,
        "wrote effectiveness edges"
    );

    for record in moves {
        store
            .create_move(record)
            .await
            .with_context(|| format!("failed to write move {}", record.name))?;
        summary.moves += 1;

        for species_id in &record.species {
            store
                .create_skill(*species_id, &record.name)
                .await
                .with_context(|| {
                    format!(
                        "failed to write skill {} -> {}",
                        species_id, record.name
                    )
                })?;
            summary.skills += 1;
        }
    }
    tracing::info!(
        moves = summary.moves,
        skills = summary.skills,
        "wrote move nodes and skill edges"
    );

    Ok(summary)
}
