use async_trait::async_trait;
use neo4rs::{Graph, Node, Query, query};
use pokegraph_config::{GraphBackendKind, GraphConfig, WriteMode};
use pokegraph_core::{MoveRecord, SpeciesId, SpeciesRecord};

use super::{GraphStats, GraphStore, SpeciesNode, StoreError, TypeTally};

const SCHEMA_CONSTRAINTS: [&str; 2] = [
    "CREATE CONSTRAINT pokemon_id IF NOT EXISTS FOR (p:Pokemon) REQUIRE p.id IS UNIQUE",
    "CREATE CONSTRAINT move_name IF NOT EXISTS FOR (m:Move) REQUIRE m.name IS UNIQUE",
];

const CREATE_SPECIES: &str = "CREATE (p:Pokemon {id: $id, name: $name, url: $url, \
     height: $height, weight: $weight, types: $types})";
const MERGE_SPECIES: &str = "MERGE (p:Pokemon {id: $id}) \
     SET p.name = $name, p.url = $url, p.height = $height, p.weight = $weight, p.types = $types";

const CREATE_MOVE: &str = "CREATE (m:Move {name: $name, description: $description, url: $url})";
const MERGE_MOVE: &str =
    "MERGE (m:Move {name: $name}) SET m.description = $description, m.url = $url";

const CREATE_EVOLUTION: &str = "MATCH (a:Pokemon {id: $from_id}), (b:Pokemon {id: $to_id}) \
     CREATE (a)-[:EVOLVE]->(b)";
const MERGE_EVOLUTION: &str = "MATCH (a:Pokemon {id: $from_id}), (b:Pokemon {id: $to_id}) \
     MERGE (a)-[:EVOLVE]->(b)";

const CREATE_SKILL: &str = "MATCH (p:Pokemon {id: $species_id}), (m:Move {name: $move_name}) \
     CREATE (p)-[:SKILL]->(m)";
const MERGE_SKILL: &str = "MATCH (p:Pokemon {id: $species_id}), (m:Move {name: $move_name}) \
     MERGE (p)-[:SKILL]->(m)";

const CREATE_EFFECTIVENESS: &str = "MATCH (a:Pokemon), (b:Pokemon) \
     WHERE $strong IN a.types AND $weak IN b.types \
     CREATE (a)-[:EFFECTIVE_AGAINST {strong: $strong, weak: $weak}]->(b)";
const MERGE_EFFECTIVENESS: &str = "MATCH (a:Pokemon), (b:Pokemon) \
     WHERE $strong IN a.types AND $weak IN b.types \
     MERGE (a)-[:EFFECTIVE_AGAINST {strong: $strong, weak: $weak}]->(b)";

const SPECIES_WEIGHTS: &str = "MATCH (p:Pokemon) RETURN p.name AS name, p.weight AS weight";

const MOST_COMMON_DEFENDER_TYPE: &str = "MATCH (p1:Pokemon)-[:EFFECTIVE_AGAINST]->(p2:Pokemon) \
     WHERE $attacking_type IN p1.types \
     UNWIND p2.types AS type \
     RETURN type, count(type) AS count \
     ORDER BY count DESC, type ASC \
     LIMIT 1";

const GRAPH_STATS: &str = "CALL { MATCH (p:Pokemon) RETURN count(p) AS species_nodes } \
     CALL { MATCH (m:Move) RETURN count(m) AS move_nodes } \
     CALL { MATCH (:Pokemon)-[r:EVOLVE]->(:Pokemon) RETURN count(r) AS evolution_edges } \
     CALL { MATCH (:Pokemon)-[r:SKILL]->(:Move) RETURN count(r) AS skill_edges } \
     CALL { MATCH (:Pokemon)-[r:EFFECTIVE_AGAINST]->(:Pokemon) \
            RETURN count(r) AS effectiveness_edges } \
     RETURN species_nodes, move_nodes, evolution_edges, skill_edges, effectiveness_edges";

/// Numeric part of a `<number> kg` weight property, mirroring `parse_weight_kg`.
fn weight_kg_expr(var: &str) -> String {
    format!("toFloat(trim(left(trim({var}.weight), size(trim({var}.weight)) - 2)))")
}

fn effective_attackers_cypher() -> String {
    format!(
        "MATCH (p1:Pokemon)-[:EFFECTIVE_AGAINST]->(p2:Pokemon {{name: $target_name}}) \
         WHERE {} > $min_weight \
         RETURN p1",
        weight_kg_expr("p1")
    )
}

fn weight_doubling_cypher() -> String {
    format!(
        "MATCH (p1:Pokemon)-[:EVOLVE]->(p2:Pokemon) \
         WHERE {} >= 2 * {} \
         RETURN count(p2) AS count",
        weight_kg_expr("p2"),
        weight_kg_expr("p1")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Neo4jSettings {
    pub fn from_config(config: &GraphConfig) -> Result<Self, StoreError> {
        Self::from_config_with_env(config, |name| std::env::var(name).ok())
    }

    fn from_config_with_env(
        config: &GraphConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        let password = lookup(&config.password_env)
            .ok_or_else(|| StoreError::MissingPassword(config.password_env.clone()))?;

        Ok(Self {
            uri: config.uri.clone(),
            user: config.user.clone(),
            password,
        })
    }
}

pub struct Neo4jGraphStore {
    graph: Graph,
    write_mode: WriteMode,
}

impl Neo4jGraphStore {
    pub async fn connect(settings: &Neo4jSettings, write_mode: WriteMode) -> Result<Self, StoreError> {
        let graph = Graph::new(
            settings.uri.as_str(),
            settings.user.as_str(),
            settings.password.as_str(),
        )
        .await?;
        tracing::info!(uri = %settings.uri, user = %settings.user, "connected to neo4j");

        Ok(Self { graph, write_mode })
    }

    fn pick(&self, create: &'static str, merge: &'static str) -> &'static str {
        match self.write_mode {
            WriteMode::Create => create,
            WriteMode::Merge => merge,
        }
    }

    async fn write(&self, statement: Query) -> Result<(), StoreError> {
        let mut txn = self.graph.start_txn().await?;
        txn.run(statement).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn fetch_one_count(&self, statement: Query) -> Result<i64, StoreError> {
        let mut rows = self.graph.execute(statement).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>("count")?),
            None => Ok(0),
        }
    }
}

fn species_params(statement: &'static str, species: &SpeciesRecord) -> Query {
    query(statement)
        .param("id", species.id)
        .param("name", species.name.as_str())
        .param("url", species.url.as_str())
        .param("height", species.height.as_str())
        .param("weight", species.weight.as_str())
        .param("types", species.types.clone())
}

fn node_to_species(node: &Node) -> Result<SpeciesNode, StoreError> {
    Ok(SpeciesNode {
        id: node.get::<i64>("id")?,
        name: node.get::<String>("name")?,
        url: node.get::<String>("url")?,
        height: node.get::<String>("height")?,
        weight: node.get::<String>("weight")?,
        types: node.get::<Vec<String>>("types")?,
    })
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    fn backend(&self) -> GraphBackendKind {
        GraphBackendKind::Neo4j
    }

    fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.write_mode == WriteMode::Create {
            return Ok(());
        }

        for constraint in SCHEMA_CONSTRAINTS {
            self.graph.run(query(constraint)).await?;
        }
        Ok(())
    }

    async fn create_species(&self, species: &SpeciesRecord) -> Result<(), StoreError> {
        let statement = self.pick(CREATE_SPECIES, MERGE_SPECIES);
        self.write(species_params(statement, species)).await?;
        tracing::debug!(id = species.id, name = %species.name, "neo4j species written");
        Ok(())
    }

    async fn create_move(&self, record: &MoveRecord) -> Result<(), StoreError> {
        let statement = query(self.pick(CREATE_MOVE, MERGE_MOVE))
            .param("name", record.name.as_str())
            .param("description", record.description.as_str())
            .param("url", record.url.as_str());
        self.write(statement).await?;
        tracing::debug!(name = %record.name, "neo4j move written");
        Ok(())
    }

    async fn create_evolution(&self, from: SpeciesId, to: SpeciesId) -> Result<(), StoreError> {
        let statement = query(self.pick(CREATE_EVOLUTION, MERGE_EVOLUTION))
            .param("from_id", from)
            .param("to_id", to);
        self.write(statement).await?;
        tracing::debug!(from, to, "neo4j evolution written");
        Ok(())
    }

    async fn create_skill(&self, species: SpeciesId, move_name: &str) -> Result<(), StoreError> {
        let statement = query(self.pick(CREATE_SKILL, MERGE_SKILL))
            .param("species_id", species)
            .param("move_name", move_name);
        self.write(statement).await?;
        tracing::debug!(species, move_name, "neo4j skill written");
        Ok(())
    }

    async fn create_effectiveness(
        &self,
        attacking: &str,
        defending: &str,
    ) -> Result<(), StoreError> {
        let statement = query(self.pick(CREATE_EFFECTIVENESS, MERGE_EFFECTIVENESS))
            .param("strong", attacking)
            .param("weak", defending);
        self.write(statement).await?;
        tracing::debug!(attacking, defending, "neo4j effectiveness written");
        Ok(())
    }

    async fn species_weights(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut rows = self.graph.execute(query(SPECIES_WEIGHTS)).await?;
        let mut weights = Vec::new();
        while let Some(row) = rows.next().await? {
            weights.push((row.get::<String>("name")?, row.get::<String>("weight")?));
        }
        Ok(weights)
    }

    async fn effective_attackers_by_weight(
        &self,
        target_name: &str,
        min_weight_kg: f64,
    ) -> Result<Vec<SpeciesNode>, StoreError> {
        let statement = query(&effective_attackers_cypher())
            .param("target_name", target_name)
            .param("min_weight", min_weight_kg);
        let mut rows = self.graph.execute(statement).await?;

        let mut attackers = Vec::new();
        while let Some(row) = rows.next().await? {
            let node: Node = row.get("p1")?;
            attackers.push(node_to_species(&node)?);
        }
        Ok(attackers)
    }

    async fn most_common_defender_type(
        &self,
        attacking_type: &str,
    ) -> Result<Option<TypeTally>, StoreError> {
        let statement = query(MOST_COMMON_DEFENDER_TYPE).param("attacking_type", attacking_type);
        let mut rows = self.graph.execute(statement).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(TypeTally {
                type_name: row.get::<String>("type")?,
                count: row.get::<i64>("count")?,
            })),
            None => Ok(None),
        }
    }

    async fn count_weight_doubling_evolutions(&self) -> Result<i64, StoreError> {
        self.fetch_one_count(query(&weight_doubling_cypher())).await
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let mut rows = self.graph.execute(query(GRAPH_STATS)).await?;
        let Some(row) = rows.next().await? else {
            return Ok(GraphStats::default());
        };

        Ok(GraphStats {
            species_nodes: row.get("species_nodes")?,
            move_nodes: row.get("move_nodes")?,
            evolution_edges: row.get("evolution_edges")?,
            skill_edges: row.get("skill_edges")?,
            effectiveness_edges: row.get("effectiveness_edges")?,
        })
    }
}
