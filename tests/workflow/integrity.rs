use phaselock::core::error::WorkflowError;
use phaselock::core::hash;
use phaselock::core::store::Store;
use phaselock::workflow::audit::AuditAction;
use phaselock::workflow::decision::DecisionDraft;
use phaselock::workflow::enforcer::Enforcer;
use rusqlite::params;
use tempfile::tempdir;

fn locked_decision(enforcer: &Enforcer<'_>, phase_id: &str, title: &str) -> String {
    let decision = enforcer
        .create_decision(phase_id, &DecisionDraft::titled(title))
        .unwrap();
    let token = enforcer.request_lock_decision(&decision.id).unwrap();
    enforcer
        .confirm_lock_decision(&decision.id, &token.token, "LOCK")
        .unwrap();
    decision.id
}

#[test]
fn test_tampered_decision_fails_on_read() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Use SQLite"))
        .unwrap();

    store
        .conn()
        .execute(
            "UPDATE decisions SET title = 'Use a spreadsheet' WHERE id = ?1",
            params![decision.id],
        )
        .unwrap();

    let err = enforcer.get_decision(&decision.id).unwrap_err();
    assert_eq!(err.code(), "E4003");
    assert!(err.is_integrity_failure());
    match err {
        WorkflowError::HashVerification {
            entity_type,
            entity_id,
            expected,
            actual,
        } => {
            assert_eq!(entity_type, "decision");
            assert_eq!(entity_id, decision.id);
            assert_eq!(expected, decision.content_hash);
            assert_ne!(actual, expected);
            assert!(hash::is_well_formed(&actual));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_tampering_blocks_mutations_too() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let doc = enforcer.create_document(&phase.id, "Notes", "original").unwrap();

    store
        .conn()
        .execute(
            "UPDATE documents SET content = 'forged' WHERE id = ?1",
            params![doc.id],
        )
        .unwrap();

    let err = enforcer
        .update_document(&doc.id, "Notes", "legit edit")
        .unwrap_err();
    assert_eq!(err.code(), "E4003");
    let raw: String = store
        .conn()
        .query_row(
            "SELECT content FROM documents WHERE id = ?1",
            params![doc.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(raw, "forged");
}

#[test]
fn test_reparented_task_is_detected() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let first = locked_decision(&enforcer, &phase.id, "First");
    let second = locked_decision(&enforcer, &phase.id, "Second");
    let task = enforcer.create_task(&first, "Ship it", "").unwrap();

    // Same title and description, different parent.
    store
        .conn()
        .execute(
            "UPDATE tasks SET decision_id = ?1 WHERE id = ?2",
            params![second, task.id],
        )
        .unwrap();

    assert_eq!(enforcer.get_task(&task.id).unwrap_err().code(), "E4003");
    assert_eq!(enforcer.list_tasks(&second).unwrap_err().code(), "E4003");
}

#[test]
fn test_reparented_document_is_detected() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let old = enforcer.create_phase("Old", "").unwrap();
    let doc = enforcer.create_document(&old.id, "Spec", "body").unwrap();
    enforcer.abandon_phase(&old.id).unwrap();
    let new = enforcer.create_phase("New", "").unwrap();

    store
        .conn()
        .execute(
            "UPDATE documents SET phase_id = ?1 WHERE id = ?2",
            params![new.id, doc.id],
        )
        .unwrap();

    assert_eq!(enforcer.list_documents(&new.id).unwrap_err().code(), "E4003");
}

#[test]
fn test_integrity_failures_are_audited() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    store
        .conn()
        .execute(
            "UPDATE phases SET name = 'Renamed behind our back' WHERE id = ?1",
            params![phase.id],
        )
        .unwrap();

    enforcer.get_phase(&phase.id).unwrap_err();

    let entries = enforcer
        .audit()
        .by_action(AuditAction::IntegrityViolation)
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entity_type, "phase");
    assert_eq!(entries[0].entity_id, phase.id);
    assert_eq!(entries[0].metadata["code"], "E4003");
}

#[test]
fn test_verify_all_counts_rows_and_catches_forgery() {
    let tmp = tempdir().unwrap();
    let store = Store::open(&tmp.path().join("phaselock.db"), 5).unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = locked_decision(&enforcer, &phase.id, "D");
    enforcer.create_task(&decision, "T1", "").unwrap();
    enforcer.create_task(&decision, "T2", "").unwrap();
    enforcer.create_document(&phase.id, "Doc", "text").unwrap();

    // phase + decision + 2 tasks + document
    assert_eq!(enforcer.verify_all().unwrap(), 5);

    store
        .conn()
        .execute(
            "UPDATE tasks SET description = 'forged' WHERE title = 'T2'",
            [],
        )
        .unwrap();
    assert_eq!(enforcer.verify_all().unwrap_err().code(), "E4003");
}

#[test]
fn test_snapshot_forgery_needs_trigger_removal_and_is_still_caught() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    enforcer.create_document(&phase.id, "Notes", "final").unwrap();
    let token = enforcer.request_close_phase(&phase.id).unwrap();
    let closure = enforcer
        .confirm_close_phase(&phase.id, &token.token, "CLOSE")
        .unwrap();
    let snapshot = &closure.snapshots[0];

    let blocked = store.conn().execute(
        "UPDATE document_snapshots SET content = 'forged' WHERE id = ?1",
        params![snapshot.id],
    );
    assert!(blocked.is_err());

    store
        .conn()
        .execute_batch("DROP TRIGGER trg_snapshots_no_update;")
        .unwrap();
    store
        .conn()
        .execute(
            "UPDATE document_snapshots SET content = 'forged' WHERE id = ?1",
            params![snapshot.id],
        )
        .unwrap();
    assert_eq!(enforcer.list_snapshots(&phase.id).unwrap_err().code(), "E4003");
}
