//! Centralized schema definitions for the workflow store.
//!
//! One SQLite database holds the workflow entities, the audit trail, and the
//! confirmation-token ledger. Constraints here are a failsafe behind the enforcer,
//! never the primary authority.

pub const SCHEMA_VERSION: u32 = 1;

pub const DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const DB_SCHEMA_IDEAS: &str = "
    CREATE TABLE IF NOT EXISTS ideas (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'PARKED', -- PARKED, PROMOTED, ABANDONED
        promoted_phase_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
";

pub const DB_SCHEMA_PHASES: &str = "
    CREATE TABLE IF NOT EXISTS phases (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'ACTIVE', -- ACTIVE, CLOSED, ABANDONED
        content_hash TEXT NOT NULL,
        source_idea_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        closed_at INTEGER
    )
";

/// At most one ACTIVE phase. Losers of a concurrent create hit this.
pub const DB_INDEX_PHASES_SINGLE_ACTIVE: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_phases_single_active
        ON phases(status) WHERE status = 'ACTIVE'
";
pub const SINGLE_ACTIVE_INDEX_NAME: &str = "idx_phases_single_active";

pub const DB_SCHEMA_DECISIONS: &str = "
    CREATE TABLE IF NOT EXISTS decisions (
        id TEXT PRIMARY KEY,
        phase_id TEXT NOT NULL,
        title TEXT NOT NULL,
        statement TEXT NOT NULL DEFAULT '',
        rationale TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'DRAFT', -- DRAFT, LOCKED
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        locked_at INTEGER,
        FOREIGN KEY(phase_id) REFERENCES phases(id) ON DELETE CASCADE
    )
";

pub const DB_SCHEMA_TASKS: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        decision_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'PENDING', -- PENDING, IN_PROGRESS, COMPLETED, CANCELLED
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        completed_at INTEGER,
        FOREIGN KEY(decision_id) REFERENCES decisions(id) ON DELETE CASCADE
    )
";

pub const DB_SCHEMA_DOCUMENTS: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        phase_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY(phase_id) REFERENCES phases(id) ON DELETE CASCADE
    )
";

// No foreign keys: snapshots outlive a phase reset.
pub const DB_SCHEMA_DOCUMENT_SNAPSHOTS: &str = "
    CREATE TABLE IF NOT EXISTS document_snapshots (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        phase_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
";

pub const DB_SCHEMA_AUDIT_LOG: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        action TEXT NOT NULL,
        old_state TEXT,
        new_state TEXT,
        metadata TEXT NOT NULL DEFAULT '{}', -- JSON object
        created_at INTEGER NOT NULL
    )
";

pub const DB_SCHEMA_USED_TOKENS: &str = "
    CREATE TABLE IF NOT EXISTS used_tokens (
        token TEXT PRIMARY KEY,
        action TEXT NOT NULL,
        used_at INTEGER NOT NULL
    )
";

pub const DB_SCHEMA_ISSUED_TOKENS: &str = "
    CREATE TABLE IF NOT EXISTS issued_tokens (
        token TEXT PRIMARY KEY,
        action TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        issued_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )
";

pub const DB_TRIGGERS_APPEND_ONLY: &str = "
    CREATE TRIGGER IF NOT EXISTS trg_audit_log_no_update BEFORE UPDATE ON audit_log
    BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_audit_log_no_delete BEFORE DELETE ON audit_log
    BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_snapshots_no_update BEFORE UPDATE ON document_snapshots
    BEGIN SELECT RAISE(ABORT, 'document_snapshots are immutable'); END;
    CREATE TRIGGER IF NOT EXISTS trg_snapshots_no_delete BEFORE DELETE ON document_snapshots
    BEGIN SELECT RAISE(ABORT, 'document_snapshots are immutable'); END;
    CREATE TRIGGER IF NOT EXISTS trg_used_tokens_no_update BEFORE UPDATE ON used_tokens
    BEGIN SELECT RAISE(ABORT, 'used_tokens is write-once'); END;
    CREATE TRIGGER IF NOT EXISTS trg_used_tokens_no_delete BEFORE DELETE ON used_tokens
    BEGIN SELECT RAISE(ABORT, 'used_tokens is write-once'); END;
";

pub const DB_INDEX_DECISIONS_PHASE: &str =
    "CREATE INDEX IF NOT EXISTS idx_decisions_phase ON decisions(phase_id)";
pub const DB_INDEX_TASKS_DECISION: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_decision ON tasks(decision_id)";
pub const DB_INDEX_DOCUMENTS_PHASE: &str =
    "CREATE INDEX IF NOT EXISTS idx_documents_phase ON documents(phase_id)";
pub const DB_INDEX_SNAPSHOTS_PHASE: &str =
    "CREATE INDEX IF NOT EXISTS idx_snapshots_phase ON document_snapshots(phase_id)";
pub const DB_INDEX_AUDIT_ENTITY: &str =
    "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id)";
pub const DB_INDEX_AUDIT_ACTION: &str =
    "CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_log(action)";
pub const DB_INDEX_AUDIT_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_log(created_at)";

/// Applied in order by `db::initialize_schema`.
pub const ALL_STATEMENTS: &[&str] = &[
    DB_SCHEMA_META,
    DB_SCHEMA_IDEAS,
    DB_SCHEMA_PHASES,
    DB_INDEX_PHASES_SINGLE_ACTIVE,
    DB_SCHEMA_DECISIONS,
    DB_SCHEMA_TASKS,
    DB_SCHEMA_DOCUMENTS,
    DB_SCHEMA_DOCUMENT_SNAPSHOTS,
    DB_SCHEMA_AUDIT_LOG,
    DB_SCHEMA_USED_TOKENS,
    DB_SCHEMA_ISSUED_TOKENS,
    DB_TRIGGERS_APPEND_ONLY,
    DB_INDEX_DECISIONS_PHASE,
    DB_INDEX_TASKS_DECISION,
    DB_INDEX_DOCUMENTS_PHASE,
    DB_INDEX_SNAPSHOTS_PHASE,
    DB_INDEX_AUDIT_ENTITY,
    DB_INDEX_AUDIT_ACTION,
    DB_INDEX_AUDIT_CREATED,
];
