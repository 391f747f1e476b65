use std::path::Path;

use async_trait::async_trait;
use pokegraph_config::{GraphBackendKind, GraphConfig, WriteMode, resolve_path};
use pokegraph_core::{MoveRecord, SpeciesId, SpeciesRecord, WeightError, parse_weight_kg};
use serde::Serialize;
use thiserror::Error;

mod graph_neo4j;
mod graph_sqlite;

pub use graph_neo4j::{Neo4jGraphStore, Neo4jSettings};
pub use graph_sqlite::SqliteGraphStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),
    #[error("failed to decode neo4j row: {0}")]
    Decode(#[from] neo4rs::DeError),
    #[error("species '{name}' has a malformed weight: {source}")]
    MalformedWeight {
        name: String,
        #[source]
        source: WeightError,
    },
    #[error("environment variable {0} holding the neo4j password is not set")]
    MissingPassword(String),
    #[error("sqlite graph connection lock poisoned")]
    LockPoisoned,
}

/// A species node as read back from the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesNode {
    pub id: SpeciesId,
    pub name: String,
    pub url: String,
    pub height: String,
    pub weight: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTally {
    #[serde(rename = "type")]
    pub type_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GraphStats {
    pub species_nodes: i64,
    pub move_nodes: i64,
    pub evolution_edges: i64,
    pub skill_edges: i64,
    pub effectiveness_edges: i64,
}

/// Write and read operations over the species graph.
///
/// Every write runs as its own transaction. Edge writes match their
/// endpoints by key and create nothing when a match fails, so callers must
/// write nodes before the edges that reference them.
#[async_trait]
pub trait GraphStore: Send + Sync {
    fn backend(&self) -> GraphBackendKind;

    fn write_mode(&self) -> WriteMode;

    /// Creates whatever schema the backend needs for the configured write mode.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn create_species(&self, species: &SpeciesRecord) -> Result<(), StoreError>;

    async fn create_move(&self, record: &MoveRecord) -> Result<(), StoreError>;

    async fn create_evolution(&self, from: SpeciesId, to: SpeciesId) -> Result<(), StoreError>;

    async fn create_skill(&self, species: SpeciesId, move_name: &str) -> Result<(), StoreError>;

    /// Links every species carrying `attacking` to every species carrying `defending`.
    async fn create_effectiveness(
        &self,
        attacking: &str,
        defending: &str,
    ) -> Result<(), StoreError>;

    /// `(name, weight)` for every species node.
    async fn species_weights(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Fails on the first species whose weight does not parse.
    ///
    /// Read queries assume this has passed; without it a malformed weight
    /// would be dropped silently by stores that coerce it to null.
    async fn validate_weights(&self) -> Result<(), StoreError> {
        for (name, weight) in self.species_weights().await? {
            weight_of(&name, &weight)?;
        }
        Ok(())
    }

    async fn effective_attackers_by_weight(
        &self,
        target_name: &str,
        min_weight_kg: f64,
    ) -> Result<Vec<SpeciesNode>, StoreError>;

    /// Most frequent defender type under `attacking_type`, ties broken by type name.
    async fn most_common_defender_type(
        &self,
        attacking_type: &str,
    ) -> Result<Option<TypeTally>, StoreError>;

    async fn count_weight_doubling_evolutions(&self) -> Result<i64, StoreError>;

    async fn stats(&self) -> Result<GraphStats, StoreError>;
}

pub async fn open_graph_store(
    workspace_root: impl AsRef<Path>,
    config: &GraphConfig,
    write_mode: WriteMode,
) -> Result<Box<dyn GraphStore>, StoreError> {
    match config.backend {
        GraphBackendKind::Neo4j => {
            let settings = Neo4jSettings::from_config(config)?;
            let store = Neo4jGraphStore::connect(&settings, write_mode).await?;
            Ok(Box::new(store))
        }
        GraphBackendKind::Sqlite => {
            let path = resolve_path(workspace_root, &config.sqlite_path);
            let store = SqliteGraphStore::open(path, write_mode)?;
            Ok(Box::new(store))
        }
    }
}

pub(crate) fn weight_of(name: &str, weight: &str) -> Result<f64, StoreError> {
    parse_weight_kg(weight).map_err(|source| StoreError::MalformedWeight {
        name: name.to_owned(),
        source,
    })
}
