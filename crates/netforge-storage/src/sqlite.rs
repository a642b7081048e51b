//! SQLite implementation of [`ProjectStore`].
//!
//! [`SqliteStore`] persists projects with WAL mode, a transaction around
//! every write, and automatic schema migrations. Block parameters and the
//! training configuration are stored as JSON TEXT columns.

use rusqlite::{params, Connection, OptionalExtension, Row};

use netforge_core::{ArchitectureGraph, Edge, EdgeId, Node, NodeId, Position, TrainingConfig};

use crate::convert::{
    block_to_row, decompose, edge_to_row, recompose, row_to_block, row_to_edge, DecomposedGraph,
    StoredBlock, StoredEdge,
};
use crate::error::StorageError;
use crate::traits::ProjectStore;
use crate::types::{Project, ProjectId, ProjectSummary};

const BLOCK_COLUMNS: &str =
    "block_id, block_type, sequence_index, label, position_x, position_y, data_json";
const EDGE_COLUMNS: &str = "edge_id, source_id, target_id, ordinal";

/// SQLite-backed implementation of [`ProjectStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn assert_project_exists(conn: &Connection, id: ProjectId) -> Result<(), StorageError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::ProjectNotFound(id.0));
        }
        Ok(())
    }

    fn block_exists(conn: &Connection, project: ProjectId, id: &str) -> Result<bool, StorageError> {
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM blocks WHERE project_id = ?1 AND block_id = ?2)",
            params![project.0, id],
            |row| row.get(0),
        )?)
    }

    fn read_block(row: &Row<'_>) -> rusqlite::Result<StoredBlock> {
        let x: Option<f64> = row.get(4)?;
        let y: Option<f64> = row.get(5)?;
        Ok(StoredBlock {
            id: row.get(0)?,
            kind: row.get(1)?,
            sequence_index: row.get(2)?,
            label: row.get(3)?,
            position: x.zip(y).map(|(x, y)| Position { x, y }),
            data_json: row.get(6)?,
        })
    }

    fn read_edge(row: &Row<'_>) -> rusqlite::Result<StoredEdge> {
        Ok(StoredEdge {
            id: row.get(0)?,
            source: row.get(1)?,
            target: row.get(2)?,
            ordinal: row.get(3)?,
        })
    }

    fn write_block(
        conn: &Connection,
        project: ProjectId,
        row: &StoredBlock,
    ) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO blocks (project_id, block_id, block_type, sequence_index, label, position_x, position_y, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                project.0,
                row.id,
                row.kind,
                row.sequence_index,
                row.label,
                row.position.map(|p| p.x),
                row.position.map(|p| p.y),
                row.data_json,
            ],
        )?;
        Ok(())
    }

    fn write_edge(conn: &Connection, project: ProjectId, row: &StoredEdge) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO edges (project_id, edge_id, source_id, target_id, ordinal) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project.0, row.id, row.source, row.target, row.ordinal],
        )?;
        Ok(())
    }

    fn query_edges(&self, project: ProjectId, column: &str, node: &str) -> Result<Vec<StoredEdge>, StorageError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE project_id = ?1 AND {column} = ?2 ORDER BY ordinal"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![project.0, node], Self::read_edge)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn load_rows(&self, project: ProjectId) -> Result<DecomposedGraph, StorageError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE project_id = ?1 ORDER BY rowid"
        ))?;
        let blocks = stmt
            .query_map(params![project.0], Self::read_block)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE project_id = ?1 ORDER BY ordinal"
        ))?;
        let edges = stmt
            .query_map(params![project.0], Self::read_edge)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DecomposedGraph { blocks, edges })
    }
}

impl ProjectStore for SqliteStore {
    // -------------------------------------------------------------------
    // Project-level operations
    // -------------------------------------------------------------------

    fn create_project(&mut self, name: &str, owner: &str) -> Result<ProjectId, StorageError> {
        let training_json = serde_json::to_string(&TrainingConfig::default())?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO projects (name, owner, training_json) VALUES (?1, ?2, ?3)",
            params![name, owner, training_json],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(ProjectId(id))
    }

    fn load_project(&self, id: ProjectId) -> Result<Project, StorageError> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT name, owner, training_json FROM projects WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (name, owner, training_json) = row.ok_or(StorageError::ProjectNotFound(id.0))?;
        let training: TrainingConfig = serde_json::from_str(&training_json)?;
        let graph = recompose(self.load_rows(id)?)?;
        Ok(Project {
            id,
            name,
            owner,
            graph,
            training,
        })
    }

    fn save_project(
        &mut self,
        id: ProjectId,
        graph: &ArchitectureGraph,
        training: &TrainingConfig,
    ) -> Result<(), StorageError> {
        let rows = decompose(graph)?;
        let training_json = serde_json::to_string(training)?;

        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, id)?;
        tx.execute("DELETE FROM edges WHERE project_id = ?1", params![id.0])?;
        tx.execute("DELETE FROM blocks WHERE project_id = ?1", params![id.0])?;
        for block in &rows.blocks {
            Self::write_block(&tx, id, block)?;
        }
        for edge in &rows.edges {
            Self::write_edge(&tx, id, edge)?;
        }
        tx.execute(
            "UPDATE projects SET training_json = ?2 WHERE id = ?1",
            params![id.0, training_json],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_project(&mut self, id: ProjectId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        if rows == 0 {
            return Err(StorageError::ProjectNotFound(id.0));
        }
        Ok(())
    }

    fn list_projects(&self, owner: Option<&str>) -> Result<Vec<ProjectSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, owner FROM projects WHERE ?1 IS NULL OR owner = ?1 ORDER BY id",
        )?;
        let summaries = stmt
            .query_map(params![owner], |row| {
                Ok(ProjectSummary {
                    id: ProjectId(row.get(0)?),
                    name: row.get(1)?,
                    owner: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    // -------------------------------------------------------------------
    // Block CRUD
    // -------------------------------------------------------------------

    fn insert_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError> {
        let row = block_to_row(node)?;
        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, project)?;
        if Self::block_exists(&tx, project, &row.id)? {
            return Err(StorageError::IntegrityError {
                reason: format!("block '{}' already exists", row.id),
            });
        }
        Self::write_block(&tx, project, &row)?;
        tx.commit()?;
        Ok(())
    }

    fn get_node(&self, project: ProjectId, id: &NodeId) -> Result<Node, StorageError> {
        Self::assert_project_exists(&self.conn, project)?;
        let row = self
            .conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE project_id = ?1 AND block_id = ?2"),
                params![project.0, id.0],
                Self::read_block,
            )
            .optional()?;
        match row {
            Some(row) => row_to_block(row),
            None => Err(StorageError::NodeNotFound {
                project: project.0,
                node: id.0.clone(),
            }),
        }
    }

    fn update_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError> {
        let row = block_to_row(node)?;
        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, project)?;
        let changed = tx.execute(
            "UPDATE blocks SET block_type = ?3, sequence_index = ?4, label = ?5, position_x = ?6, position_y = ?7, data_json = ?8
             WHERE project_id = ?1 AND block_id = ?2",
            params![
                project.0,
                row.id,
                row.kind,
                row.sequence_index,
                row.label,
                row.position.map(|p| p.x),
                row.position.map(|p| p.y),
                row.data_json,
            ],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StorageError::NodeNotFound {
                project: project.0,
                node: row.id,
            });
        }
        Ok(())
    }

    fn delete_node(&mut self, project: ProjectId, id: &NodeId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, project)?;
        // Connection rows cascade.
        let changed = tx.execute(
            "DELETE FROM blocks WHERE project_id = ?1 AND block_id = ?2",
            params![project.0, id.0],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StorageError::NodeNotFound {
                project: project.0,
                node: id.0.clone(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Connection CRUD
    // -------------------------------------------------------------------

    fn insert_edge(&mut self, project: ProjectId, edge: &Edge) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, project)?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM edges WHERE project_id = ?1 AND edge_id = ?2)",
            params![project.0, edge.id.0],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StorageError::IntegrityError {
                reason: format!("connection '{}' already exists", edge.id),
            });
        }
        for end in [&edge.source, &edge.target] {
            if !Self::block_exists(&tx, project, &end.0)? {
                return Err(StorageError::IntegrityError {
                    reason: format!("connection '{}' references missing block '{}'", edge.id, end),
                });
            }
        }
        let ordinal: i64 = tx.query_row(
            "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM edges WHERE project_id = ?1",
            params![project.0],
            |row| row.get(0),
        )?;
        Self::write_edge(&tx, project, &edge_to_row(edge, ordinal))?;
        tx.commit()?;
        Ok(())
    }

    fn get_edge(&self, project: ProjectId, id: &EdgeId) -> Result<Edge, StorageError> {
        Self::assert_project_exists(&self.conn, project)?;
        let row = self
            .conn
            .query_row(
                &format!("SELECT {EDGE_COLUMNS} FROM edges WHERE project_id = ?1 AND edge_id = ?2"),
                params![project.0, id.0],
                Self::read_edge,
            )
            .optional()?;
        row.map(row_to_edge).ok_or_else(|| StorageError::EdgeNotFound {
            project: project.0,
            edge: id.0.clone(),
        })
    }

    fn delete_edge(&mut self, project: ProjectId, id: &EdgeId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_project_exists(&tx, project)?;
        let changed = tx.execute(
            "DELETE FROM edges WHERE project_id = ?1 AND edge_id = ?2",
            params![project.0, id.0],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StorageError::EdgeNotFound {
                project: project.0,
                edge: id.0.clone(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    fn find_edges_from(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError> {
        Self::assert_project_exists(&self.conn, project)?;
        Ok(self
            .query_edges(project, "source_id", &node.0)?
            .into_iter()
            .map(row_to_edge)
            .collect())
    }

    fn find_edges_to(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError> {
        Self::assert_project_exists(&self.conn, project)?;
        Ok(self
            .query_edges(project, "target_id", &node.0)?
            .into_iter()
            .map(row_to_edge)
            .collect())
    }

    fn find_nodes_by_kind(&self, project: ProjectId, kind: &str) -> Result<Vec<Node>, StorageError> {
        Self::assert_project_exists(&self.conn, project)?;
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE project_id = ?1 AND block_type = ?2 ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params![project.0, kind], Self::read_block)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_block).collect()
    }

    // -------------------------------------------------------------------
    // Training configuration
    // -------------------------------------------------------------------

    fn get_training_config(&self, project: ProjectId) -> Result<TrainingConfig, StorageError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT training_json FROM projects WHERE id = ?1",
                params![project.0],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or(StorageError::ProjectNotFound(project.0))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn set_training_config(
        &mut self,
        project: ProjectId,
        training: &TrainingConfig,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(training)?;
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE projects SET training_json = ?2 WHERE id = ?1",
            params![project.0, json],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(StorageError::ProjectNotFound(project.0));
        }
        Ok(())
    }
}
