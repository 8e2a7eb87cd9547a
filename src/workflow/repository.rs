//! Row persistence for workflow entities.
//!
//! Every `find_*`/`list_*` recomputes the content hash from the row's current fields
//! (parent id included) and compares it with the stored hash before returning. A
//! mismatch is a hard stop: no retry, no fallback, no partial result. Writes refuse
//! values whose hash does not match their own fields.

use crate::core::db;
use crate::core::error::{Result, WorkflowError};
use crate::core::time;
use crate::workflow::decision::{self, Decision};
use crate::workflow::document::{self, Document, DocumentSnapshot};
use crate::workflow::idea::Idea;
use crate::workflow::phase::{self, Phase};
use crate::workflow::status::{IdeaStatus, PhaseStatus};
use crate::workflow::task::{self, Task};
use rusqlite::{Connection, OptionalExtension, Row, params};

const IDEA_COLUMNS: &str = "id, title, content, status, promoted_phase_id, created_at, updated_at";
const PHASE_COLUMNS: &str = "id, name, description, status, content_hash, source_idea_id, created_at, updated_at, closed_at";
const DECISION_COLUMNS: &str = "id, phase_id, title, statement, rationale, status, content_hash, created_at, updated_at, locked_at";
const TASK_COLUMNS: &str = "id, decision_id, title, description, status, content_hash, created_at, updated_at, completed_at";
const DOCUMENT_COLUMNS: &str = "id, phase_id, title, content, content_hash, created_at, updated_at";
const SNAPSHOT_COLUMNS: &str = "id, document_id, phase_id, title, content, content_hash, created_at";

fn idea_from_row(row: &Row<'_>) -> rusqlite::Result<Idea> {
    Ok(Idea {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        status: row.get(3)?,
        promoted_phase_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn phase_from_row(row: &Row<'_>) -> rusqlite::Result<Phase> {
    Ok(Phase {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        content_hash: row.get(4)?,
        source_idea_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        closed_at: row.get(8)?,
    })
}

fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<Decision> {
    Ok(Decision {
        id: row.get(0)?,
        phase_id: row.get(1)?,
        title: row.get(2)?,
        statement: row.get(3)?,
        rationale: row.get(4)?,
        status: row.get(5)?,
        content_hash: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        locked_at: row.get(9)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        decision_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        content_hash: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        phase_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        content_hash: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentSnapshot> {
    Ok(DocumentSnapshot {
        id: row.get(0)?,
        document_id: row.get(1)?,
        phase_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Phase writes can trip the failsafe single-active index.
fn map_phase_write_error(err: rusqlite::Error, conn: &Connection) -> WorkflowError {
    if db::is_single_active_violation(&err) {
        let lookup = conn
            .query_row(
                "SELECT id FROM phases WHERE status = 'ACTIVE' LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional();
        return match lookup {
            Ok(Some(active_phase_id)) => {
                tracing::warn!(%active_phase_id, "single-active-phase index rejected a write");
                WorkflowError::ActivePhaseExists { active_phase_id }
            }
            Ok(None) => WorkflowError::RusqliteError(err),
            Err(lookup_err) => WorkflowError::RusqliteError(lookup_err),
        };
    }
    WorkflowError::RusqliteError(err)
}

fn expect_changed(changed: usize, entity_type: &'static str, id: &str) -> Result<()> {
    if changed == 0 {
        return Err(WorkflowError::not_found(entity_type, id));
    }
    Ok(())
}

/// Borrowed view over a connection or open transaction.
pub struct Repository<'c> {
    conn: &'c Connection,
}

impl<'c> Repository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    // --- Ideas (not hashed) ---

    pub fn insert_idea(&self, idea: &Idea) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ideas(id, title, content, status, promoted_phase_id, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                idea.id,
                idea.title,
                idea.content,
                idea.status,
                idea.promoted_phase_id,
                idea.created_at,
                idea.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_idea(&self, id: &str) -> Result<Idea> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM ideas WHERE id = ?1", IDEA_COLUMNS),
                params![id],
                idea_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found("idea", id))
    }

    pub fn list_ideas(&self, status: Option<IdeaStatus>) -> Result<Vec<Idea>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM ideas WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, id",
            IDEA_COLUMNS
        ))?;
        let ideas = stmt
            .query_map(params![status], idea_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ideas)
    }

    pub fn update_idea(&self, idea: &Idea) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE ideas SET title = ?1, content = ?2, status = ?3, promoted_phase_id = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                idea.title,
                idea.content,
                idea.status,
                idea.promoted_phase_id,
                idea.updated_at,
                idea.id,
            ],
        )?;
        expect_changed(changed, "idea", &idea.id)
    }

    /// Direct status write. Bypasses the state machine, the invariants and the audit
    /// log; kept as a low-level maintenance path. Workflow callers use
    /// `Enforcer::promote_idea`/`Enforcer::abandon_idea`.
    pub fn update_idea_status(&self, id: &str, status: IdeaStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE ideas SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, time::now_millis(), id],
        )?;
        expect_changed(changed, "idea", id)
    }

    // --- Phases ---

    pub fn insert_phase(&self, phase: &Phase) -> Result<()> {
        phase.verify()?;
        self.conn
            .execute(
                "INSERT INTO phases(id, name, description, status, content_hash, source_idea_id, created_at, updated_at, closed_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    phase.id,
                    phase.name,
                    phase.description,
                    phase.status,
                    phase.content_hash,
                    phase.source_idea_id,
                    phase.created_at,
                    phase.updated_at,
                    phase.closed_at,
                ],
            )
            .map_err(|e| map_phase_write_error(e, self.conn))?;
        Ok(())
    }

    pub fn find_phase(&self, id: &str) -> Result<Phase> {
        let phase = self
            .conn
            .query_row(
                &format!("SELECT {} FROM phases WHERE id = ?1", PHASE_COLUMNS),
                params![id],
                phase_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found(phase::ENTITY, id))?;
        phase.verify()?;
        Ok(phase)
    }

    pub fn find_active_phase(&self) -> Result<Option<Phase>> {
        let phase = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM phases WHERE status = 'ACTIVE' ORDER BY created_at LIMIT 1",
                    PHASE_COLUMNS
                ),
                [],
                phase_from_row,
            )
            .optional()?;
        if let Some(phase) = &phase {
            phase.verify()?;
        }
        Ok(phase)
    }

    pub fn list_phases(&self, status: Option<PhaseStatus>) -> Result<Vec<Phase>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM phases WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, id",
            PHASE_COLUMNS
        ))?;
        let phases = stmt
            .query_map(params![status], phase_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for phase in &phases {
            phase.verify()?;
        }
        Ok(phases)
    }

    pub fn update_phase(&self, phase: &Phase) -> Result<()> {
        phase.verify()?;
        let changed = self
            .conn
            .execute(
                "UPDATE phases SET name = ?1, description = ?2, status = ?3, content_hash = ?4,
                 updated_at = ?5, closed_at = ?6 WHERE id = ?7",
                params![
                    phase.name,
                    phase.description,
                    phase.status,
                    phase.content_hash,
                    phase.updated_at,
                    phase.closed_at,
                    phase.id,
                ],
            )
            .map_err(|e| map_phase_write_error(e, self.conn))?;
        expect_changed(changed, phase::ENTITY, &phase.id)
    }

    /// Cascades to decisions, tasks and documents. Snapshots are kept.
    pub fn delete_phase(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM phases WHERE id = ?1", params![id])?;
        expect_changed(changed, phase::ENTITY, id)
    }

    // --- Decisions ---

    pub fn insert_decision(&self, decision: &Decision) -> Result<()> {
        decision.verify()?;
        self.conn.execute(
            "INSERT INTO decisions(id, phase_id, title, statement, rationale, status, content_hash, created_at, updated_at, locked_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                decision.id,
                decision.phase_id,
                decision.title,
                decision.statement,
                decision.rationale,
                decision.status,
                decision.content_hash,
                decision.created_at,
                decision.updated_at,
                decision.locked_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_decision(&self, id: &str) -> Result<Decision> {
        let decision = self
            .conn
            .query_row(
                &format!("SELECT {} FROM decisions WHERE id = ?1", DECISION_COLUMNS),
                params![id],
                decision_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found(decision::ENTITY, id))?;
        decision.verify()?;
        Ok(decision)
    }

    pub fn list_decisions(&self, phase_id: &str) -> Result<Vec<Decision>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM decisions WHERE phase_id = ?1 ORDER BY created_at, id",
            DECISION_COLUMNS
        ))?;
        let decisions = stmt
            .query_map(params![phase_id], decision_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for decision in &decisions {
            decision.verify()?;
        }
        Ok(decisions)
    }

    pub fn update_decision(&self, decision: &Decision) -> Result<()> {
        decision.verify()?;
        let changed = self.conn.execute(
            "UPDATE decisions SET title = ?1, statement = ?2, rationale = ?3, status = ?4,
             content_hash = ?5, updated_at = ?6, locked_at = ?7 WHERE id = ?8",
            params![
                decision.title,
                decision.statement,
                decision.rationale,
                decision.status,
                decision.content_hash,
                decision.updated_at,
                decision.locked_at,
                decision.id,
            ],
        )?;
        expect_changed(changed, decision::ENTITY, &decision.id)
    }

    pub fn delete_decision(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM decisions WHERE id = ?1", params![id])?;
        expect_changed(changed, decision::ENTITY, id)
    }

    // --- Tasks ---

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        task.verify()?;
        self.conn.execute(
            "INSERT INTO tasks(id, decision_id, title, description, status, content_hash, created_at, updated_at, completed_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.decision_id,
                task.title,
                task.description,
                task.status,
                task.content_hash,
                task.created_at,
                task.updated_at,
                task.completed_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_task(&self, id: &str) -> Result<Task> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                task_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found(task::ENTITY, id))?;
        task.verify()?;
        Ok(task)
    }

    pub fn list_tasks(&self, decision_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE decision_id = ?1 ORDER BY created_at, id",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![decision_id], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for task in &tasks {
            task.verify()?;
        }
        Ok(tasks)
    }

    pub fn update_task(&self, task: &Task) -> Result<()> {
        task.verify()?;
        let changed = self.conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, content_hash = ?4,
             updated_at = ?5, completed_at = ?6 WHERE id = ?7",
            params![
                task.title,
                task.description,
                task.status,
                task.content_hash,
                task.updated_at,
                task.completed_at,
                task.id,
            ],
        )?;
        expect_changed(changed, task::ENTITY, &task.id)
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        expect_changed(changed, task::ENTITY, id)
    }

    // --- Documents ---

    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        doc.verify()?;
        self.conn.execute(
            "INSERT INTO documents(id, phase_id, title, content, content_hash, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                doc.id,
                doc.phase_id,
                doc.title,
                doc.content,
                doc.content_hash,
                doc.created_at,
                doc.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_document(&self, id: &str) -> Result<Document> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id],
                document_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found(document::ENTITY, id))?;
        doc.verify()?;
        Ok(doc)
    }

    pub fn list_documents(&self, phase_id: &str) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM documents WHERE phase_id = ?1 ORDER BY created_at, id",
            DOCUMENT_COLUMNS
        ))?;
        let docs = stmt
            .query_map(params![phase_id], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for doc in &docs {
            doc.verify()?;
        }
        Ok(docs)
    }

    pub fn update_document(&self, doc: &Document) -> Result<()> {
        doc.verify()?;
        let changed = self.conn.execute(
            "UPDATE documents SET title = ?1, content = ?2, content_hash = ?3, updated_at = ?4
             WHERE id = ?5",
            params![doc.title, doc.content, doc.content_hash, doc.updated_at, doc.id],
        )?;
        expect_changed(changed, document::ENTITY, &doc.id)
    }

    pub fn delete_document(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        expect_changed(changed, document::ENTITY, id)
    }

    // --- Snapshots (insert-only) ---

    pub fn insert_snapshot(&self, snapshot: &DocumentSnapshot) -> Result<()> {
        snapshot.verify()?;
        self.conn.execute(
            "INSERT INTO document_snapshots(id, document_id, phase_id, title, content, content_hash, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.id,
                snapshot.document_id,
                snapshot.phase_id,
                snapshot.title,
                snapshot.content,
                snapshot.content_hash,
                snapshot.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_snapshot(&self, id: &str) -> Result<DocumentSnapshot> {
        let snapshot = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM document_snapshots WHERE id = ?1",
                    SNAPSHOT_COLUMNS
                ),
                params![id],
                snapshot_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found(document::SNAPSHOT_ENTITY, id))?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    pub fn list_snapshots(&self, phase_id: &str) -> Result<Vec<DocumentSnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM document_snapshots WHERE phase_id = ?1 ORDER BY created_at, id",
            SNAPSHOT_COLUMNS
        ))?;
        let snapshots = stmt
            .query_map(params![phase_id], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for snapshot in &snapshots {
            snapshot.verify()?;
        }
        Ok(snapshots)
    }

    /// Every hashed row in the store, verified. First mismatch wins.
    pub fn verify_all(&self) -> Result<usize> {
        let mut checked = 0;
        for phase in self.list_phases(None)? {
            checked += 1;
            for decision in self.list_decisions(&phase.id)? {
                checked += 1 + self.list_tasks(&decision.id)?.len();
            }
            checked += self.list_documents(&phase.id)?.len();
        }
        // Snapshots outlive their phase, so they are scanned on their own.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM document_snapshots ORDER BY created_at, id",
            SNAPSHOT_COLUMNS
        ))?;
        let snapshots = stmt
            .query_map([], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for snapshot in &snapshots {
            snapshot.verify()?;
        }
        Ok(checked + snapshots.len())
    }
}
