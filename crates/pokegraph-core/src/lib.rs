pub mod loader;
pub mod matchup;
pub mod weight;

pub use loader::{LoadError, load_moves, load_species, parse_species_tokens, split_types};
pub use matchup::{TYPE_MATCHUPS, matchup_pairs, strong_against};
pub use weight::{WEIGHT_UNIT, WeightError, is_weight_doubling, parse_weight_kg};

pub type SpeciesId = i64;

/// One species as it is written to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesRecord {
    pub id: SpeciesId,
    pub name: String,
    pub url: String,
    pub height: String,
    pub weight: String,
    pub types: Vec<String>,
    /// Ids this species evolves into, in source order.
    pub evolutions: Vec<SpeciesId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub name: String,
    pub description: String,
    pub url: String,
    /// Species that can learn this move.
    pub species: Vec<SpeciesId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvolutionLink {
    pub from: SpeciesId,
    pub to: SpeciesId,
}

/// Flattens the per-species evolution lists into directed links.
pub fn evolution_links(species: &[SpeciesRecord]) -> Vec<EvolutionLink> {
    species
        .iter()
        .flat_map(|record| {
            record.evolutions.iter().map(|to| EvolutionLink {
                from: record.id,
                to: *to,
            })
        })
        .collect()
}
