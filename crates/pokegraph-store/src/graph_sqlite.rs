use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pokegraph_config::{GraphBackendKind, WriteMode};
use pokegraph_core::{MoveRecord, SpeciesId, SpeciesRecord, is_weight_doubling};
use rusqlite::{Connection, Transaction, params};

use super::{GraphStats, GraphStore, SpeciesNode, StoreError, TypeTally, weight_of};

/// Property graph kept in SQLite tables.
///
/// Nodes carry a surrogate `node_id`, so `create` mode can hold several
/// nodes with the same species id or move name, and edge writes fan out to
/// every matching node the way a graph `MATCH ... CREATE` does.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
    sqlite_path: Option<PathBuf>,
    write_mode: WriteMode,
}

impl SqliteGraphStore {
    pub fn open(sqlite_path: impl AsRef<Path>, write_mode: WriteMode) -> Result<Self, StoreError> {
        let sqlite_path = sqlite_path.as_ref();
        if let Some(parent) = sqlite_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(sqlite_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            sqlite_path: Some(sqlite_path.to_path_buf()),
            write_mode,
        })
    }

    pub fn open_in_memory(write_mode: WriteMode) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            sqlite_path: None,
            write_mode,
        })
    }

    pub fn sqlite_path(&self) -> Option<&Path> {
        self.sqlite_path.as_deref()
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn merge_clause(&self, clause: &'static str) -> &'static str {
        match self.write_mode {
            WriteMode::Create => "",
            WriteMode::Merge => clause,
        }
    }

    /// Number of species nodes carrying `id`.
    pub fn species_node_count(&self, id: SpeciesId) -> Result<i64, StoreError> {
        let conn = self.connection()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM species WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of move nodes named `name`.
    pub fn move_node_count(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.connection()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM moves WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn species_types(&self, id: SpeciesId) -> Result<Vec<String>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.type_name
            FROM species s
            JOIN species_types t ON t.node_id = s.node_id
            WHERE s.id = ?1
            ORDER BY s.node_id ASC, t.position ASC
            "#,
        )?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Species ids `id` evolves into, one entry per edge.
    pub fn evolution_targets(&self, id: SpeciesId) -> Result<Vec<SpeciesId>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT target.id
            FROM evolve_edges e
            JOIN species source ON source.node_id = e.source_node
            JOIN species target ON target.node_id = e.target_node
            WHERE source.id = ?1
            ORDER BY e.edge_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Species ids with a skill edge to `move_name`, one entry per edge.
    pub fn skill_species(&self, move_name: &str) -> Result<Vec<SpeciesId>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.id
            FROM skill_edges e
            JOIN species s ON s.node_id = e.species_node
            JOIN moves m ON m.node_id = e.move_node
            WHERE m.name = ?1
            ORDER BY e.edge_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![move_name], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn effectiveness_edge_count(
        &self,
        attacking: &str,
        defending: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.connection()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM effective_edges WHERE strong = ?1 AND weak = ?2",
            params![attacking, defending],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    fn backend(&self) -> GraphBackendKind {
        GraphBackendKind::Sqlite
    }

    fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        run_migrations(&conn)
    }

    async fn create_species(&self, species: &SpeciesRecord) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let existing = match self.write_mode {
            WriteMode::Create => Vec::new(),
            WriteMode::Merge => node_ids(&tx, "SELECT node_id FROM species WHERE id = ?1", species.id)?,
        };

        let targets = if existing.is_empty() {
            tx.execute(
                r#"
                INSERT INTO species (id, name, url, height, weight)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    species.id,
                    species.name,
                    species.url,
                    species.height,
                    species.weight,
                ],
            )?;
            vec![tx.last_insert_rowid()]
        } else {
            tx.execute(
                r#"
                UPDATE species
                SET name = ?2, url = ?3, height = ?4, weight = ?5
                WHERE id = ?1
                "#,
                params![
                    species.id,
                    species.name,
                    species.url,
                    species.height,
                    species.weight,
                ],
            )?;
            existing
        };

        for node_id in targets {
            tx.execute(
                "DELETE FROM species_types WHERE node_id = ?1",
                params![node_id],
            )?;
            for (position, type_name) in species.types.iter().enumerate() {
                tx.execute(
                    "INSERT INTO species_types (node_id, position, type_name) VALUES (?1, ?2, ?3)",
                    params![node_id, position as i64, type_name],
                )?;
            }
        }

        tx.commit()?;
        tracing::debug!(id = species.id, name = %species.name, "sqlite species written");
        Ok(())
    }

    async fn create_move(&self, record: &MoveRecord) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let updated = match self.write_mode {
            WriteMode::Create => 0,
            WriteMode::Merge => tx.execute(
                "UPDATE moves SET description = ?2, url = ?3 WHERE name = ?1",
                params![record.name, record.description, record.url],
            )?,
        };
        if updated == 0 {
            tx.execute(
                "INSERT INTO moves (name, description, url) VALUES (?1, ?2, ?3)",
                params![record.name, record.description, record.url],
            )?;
        }

        tx.commit()?;
        tracing::debug!(name = %record.name, "sqlite move written");
        Ok(())
    }

    async fn create_evolution(&self, from: SpeciesId, to: SpeciesId) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO evolve_edges (source_node, target_node)
            SELECT a.node_id, b.node_id
            FROM species a, species b
            WHERE a.id = ?1 AND b.id = ?2
            {}
            "#,
            self.merge_clause(
                "AND NOT EXISTS (SELECT 1 FROM evolve_edges e \
                 WHERE e.source_node = a.node_id AND e.target_node = b.node_id)"
            )
        );

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let created = tx.execute(&sql, params![from, to])?;
        tx.commit()?;
        tracing::debug!(from, to, created, "sqlite evolution written");
        Ok(())
    }

    async fn create_skill(&self, species: SpeciesId, move_name: &str) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO skill_edges (species_node, move_node)
            SELECT p.node_id, m.node_id
            FROM species p, moves m
            WHERE p.id = ?1 AND m.name = ?2
            {}
            "#,
            self.merge_clause(
                "AND NOT EXISTS (SELECT 1 FROM skill_edges e \
                 WHERE e.species_node = p.node_id AND e.move_node = m.node_id)"
            )
        );

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let created = tx.execute(&sql, params![species, move_name])?;
        tx.commit()?;
        tracing::debug!(species, move_name, created, "sqlite skill written");
        Ok(())
    }

    async fn create_effectiveness(
        &self,
        attacking: &str,
        defending: &str,
    ) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO effective_edges (source_node, target_node, strong, weak)
            SELECT a.node_id, b.node_id, ?1, ?2
            FROM species a, species b
            WHERE EXISTS (
                SELECT 1 FROM species_types t WHERE t.node_id = a.node_id AND t.type_name = ?1
            )
            AND EXISTS (
                SELECT 1 FROM species_types t WHERE t.node_id = b.node_id AND t.type_name = ?2
            )
            {}
            ORDER BY a.node_id ASC, b.node_id ASC
            "#,
            self.merge_clause(
                "AND NOT EXISTS (SELECT 1 FROM effective_edges e \
                 WHERE e.source_node = a.node_id AND e.target_node = b.node_id \
                 AND e.strong = ?1 AND e.weak = ?2)"
            )
        );

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let created = tx.execute(&sql, params![attacking, defending])?;
        tx.commit()?;
        tracing::debug!(attacking, defending, created, "sqlite effectiveness written");
        Ok(())
    }

    async fn species_weights(&self) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT name, weight FROM species ORDER BY node_id ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn effective_attackers_by_weight(
        &self,
        target_name: &str,
        min_weight_kg: f64,
    ) -> Result<Vec<SpeciesNode>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.node_id, a.id, a.name, a.url, a.height, a.weight
            FROM effective_edges e
            JOIN species a ON a.node_id = e.source_node
            JOIN species b ON b.node_id = e.target_node
            WHERE b.name = ?1
            ORDER BY e.edge_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![target_name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                SpeciesNode {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    url: row.get(3)?,
                    height: row.get(4)?,
                    weight: row.get(5)?,
                    types: Vec::new(),
                },
            ))
        })?;

        let mut attackers = Vec::new();
        for row in rows {
            let (node_id, mut node) = row?;
            if weight_of(&node.name, &node.weight)? > min_weight_kg {
                node.types = node_types(&conn, node_id)?;
                attackers.push(node);
            }
        }

        Ok(attackers)
    }

    async fn most_common_defender_type(
        &self,
        attacking_type: &str,
    ) -> Result<Option<TypeTally>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.type_name, COUNT(*) AS tally
            FROM effective_edges e
            JOIN species_types t ON t.node_id = e.target_node
            WHERE EXISTS (
                SELECT 1 FROM species_types a
                WHERE a.node_id = e.source_node AND a.type_name = ?1
            )
            GROUP BY t.type_name
            ORDER BY tally DESC, t.type_name ASC
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query_map(params![attacking_type], |row| {
            Ok(TypeTally {
                type_name: row.get(0)?,
                count: row.get(1)?,
            })
        })?;

        rows.next().transpose().map_err(Into::into)
    }

    async fn count_weight_doubling_evolutions(&self) -> Result<i64, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT source.name, source.weight, target.name, target.weight
            FROM evolve_edges e
            JOIN species source ON source.node_id = e.source_node
            JOIN species target ON target.node_id = e.target_node
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut count = 0i64;
        for row in rows {
            let (source_name, source_weight, target_name, target_weight) = row?;
            let base = weight_of(&source_name, &source_weight)?;
            let evolved = weight_of(&target_name, &target_weight)?;
            if is_weight_doubling(base, evolved) {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let conn = self.connection()?;
        let count = |table: &str| -> Result<i64, StoreError> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        };

        Ok(GraphStats {
            species_nodes: count("species")?,
            move_nodes: count("moves")?,
            evolution_edges: count("evolve_edges")?,
            skill_edges: count("skill_edges")?,
            effectiveness_edges: count("effective_edges")?,
        })
    }
}

fn node_ids(tx: &Transaction<'_>, sql: &str, id: SpeciesId) -> Result<Vec<i64>, StoreError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn node_types(conn: &Connection, node_id: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT type_name FROM species_types WHERE node_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![node_id], |row| row.get(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            node_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            height TEXT NOT NULL,
            weight TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_species_id ON species(id);
        CREATE INDEX IF NOT EXISTS idx_species_name ON species(name);

        CREATE TABLE IF NOT EXISTS species_types (
            node_id INTEGER NOT NULL REFERENCES species(node_id),
            position INTEGER NOT NULL,
            type_name TEXT NOT NULL,
            PRIMARY KEY (node_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_species_types_name ON species_types(type_name);

        CREATE TABLE IF NOT EXISTS moves (
            node_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            url TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_moves_name ON moves(name);

        CREATE TABLE IF NOT EXISTS evolve_edges (
            edge_id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_node INTEGER NOT NULL REFERENCES species(node_id),
            target_node INTEGER NOT NULL REFERENCES species(node_id)
        );

        CREATE TABLE IF NOT EXISTS skill_edges (
            edge_id INTEGER PRIMARY KEY AUTOINCREMENT,
            species_node INTEGER NOT NULL REFERENCES species(node_id),
            move_node INTEGER NOT NULL REFERENCES moves(node_id)
        );

        CREATE TABLE IF NOT EXISTS effective_edges (
            edge_id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_node INTEGER NOT NULL REFERENCES species(node_id),
            target_node INTEGER NOT NULL REFERENCES species(node_id),
            strong TEXT NOT NULL,
            weak TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_effective_target ON effective_edges(target_node);
        "#,
    )?;

    Ok(())
}
