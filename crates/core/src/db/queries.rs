//! Typed query helpers for every table in the projvault database.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::merge::MergeResult;
use crate::models::ProjectId;
use crate::project::Project;

// ---------------------------------------------------------------------------
// Domain structs returned by queries
// ---------------------------------------------------------------------------

/// A row from the `projects` table, without the document.
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `audit_log` table.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub project_id: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- projects -----------------------------------------------------------

    /// Insert or replace a project document.
    pub fn save_project(&self, project: &Project) -> Result<(), DatabaseError> {
        let conn = self.conn();
        upsert_project(&conn, project)
    }

    pub fn load_project(&self, id: &ProjectId) -> Result<Project, DatabaseError> {
        let conn = self.conn();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM projects WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let document = document.ok_or_else(|| DatabaseError::NotFound {
            entity: "project".into(),
            id: id.to_string(),
        })?;
        Ok(serde_json::from_str(&document)?)
    }

    pub fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, DatabaseError> {
        let conn = self.conn();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM projects WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// List all projects by name.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, updated_at FROM projects ORDER BY name",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ProjectSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Delete a project and any pending merge for it.
    pub fn delete_project(&self, id: &ProjectId) -> Result<(), DatabaseError> {
        self.transaction(|conn| {
            conn.execute(
                "DELETE FROM pending_merges WHERE project_id = ?1",
                params![id.as_str()],
            )?;
            let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.as_str()])?;
            if deleted == 0 {
                return Err(DatabaseError::NotFound {
                    entity: "project".into(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })?;
        debug!(project = %id, "deleted project");
        Ok(())
    }

    // -- pending_merges -----------------------------------------------------

    /// Store the latest merge analysis for a project, replacing any earlier
    /// one.
    pub fn save_pending_merge(
        &self,
        project_id: &ProjectId,
        result: &MergeResult,
    ) -> Result<(), DatabaseError> {
        let document = serde_json::to_string(result)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO pending_merges (project_id, result, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(project_id) DO UPDATE SET
                result = excluded.result,
                created_at = excluded.created_at",
            params![project_id.as_str(), document, Utc::now().to_rfc3339()],
        )?;
        debug!(project = %project_id, conflicts = result.conflicts.len(), "saved pending merge");
        Ok(())
    }

    pub fn load_pending_merge(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<MergeResult>, DatabaseError> {
        let conn = self.conn();
        let document: Option<String> = conn
            .query_row(
                "SELECT result FROM pending_merges WHERE project_id = ?1",
                params![project_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    pub fn clear_pending_merge(&self, project_id: &ProjectId) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM pending_merges WHERE project_id = ?1",
            params![project_id.as_str()],
        )?;
        Ok(())
    }

    /// Save a project and record an audit entry atomically.
    pub fn commit_project(
        &self,
        project: &Project,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.transaction(|conn| {
            upsert_project(conn, project)?;
            insert_audit(conn, action, Some(project.id.as_str()), details)?;
            Ok(())
        })
    }

    // -- audit_log ----------------------------------------------------------

    /// Insert an audit-log entry.
    pub fn insert_audit_log(
        &self,
        action: &str,
        project_id: Option<&str>,
        details: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        insert_audit(&conn, action, project_id, details)
    }

    /// List recent audit-log entries, newest first.
    pub fn list_audit_log(&self, limit: u32) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, action, project_id, details, created_at
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    project_id: row.get(2)?,
                    details: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // -- kv_state -----------------------------------------------------------

    /// Get a key-value state entry.
    pub fn get_state(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv_state WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(val)) => Ok(Some(val)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Set a key-value state entry (upsert).
    pub fn set_state(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        debug!(key, value, "set kv_state");
        Ok(())
    }

    pub fn delete_state(&self, key: &str) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute("DELETE FROM kv_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn upsert_project(conn: &Connection, project: &Project) -> Result<(), DatabaseError> {
    let document = serde_json::to_string(project)?;
    conn.execute(
        "INSERT INTO projects (id, name, document, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            document = excluded.document,
            updated_at = excluded.updated_at",
        params![
            project.id.as_str(),
            project.name,
            document,
            project.created_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    debug!(project = %project.id, bytes = document.len(), "saved project document");
    Ok(())
}

fn insert_audit(
    conn: &Connection,
    action: &str,
    project_id: Option<&str>,
    details: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (action, project_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![action, project_id, details, Utc::now().to_rfc3339()],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, action, "inserted audit_log entry");
    Ok(id)
}
