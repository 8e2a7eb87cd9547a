use phaselock::core::error::WorkflowError;
use phaselock::core::store::Store;
use phaselock::workflow::audit::AuditAction;
use phaselock::workflow::decision::{Decision, DecisionDraft};
use phaselock::workflow::enforcer::Enforcer;
use phaselock::workflow::phase::Phase;
use phaselock::workflow::repository::Repository;
use phaselock::workflow::status::{DecisionStatus, IdeaStatus, PhaseStatus, TaskStatus};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn lock(enforcer: &Enforcer<'_>, decision_id: &str) -> Decision {
    let token = enforcer.request_lock_decision(decision_id).unwrap();
    enforcer
        .confirm_lock_decision(decision_id, &token.token, &token.confirmation)
        .unwrap()
}

fn close(enforcer: &Enforcer<'_>, phase_id: &str) -> Phase {
    let token = enforcer.request_close_phase(phase_id).unwrap();
    enforcer
        .confirm_close_phase(phase_id, &token.token, &token.confirmation)
        .unwrap()
        .phase
}

#[test]
fn test_enf01_second_active_phase_rejected() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);

    let first = enforcer.create_phase("Discovery", "").unwrap();
    let err = enforcer.create_phase("Build", "").unwrap_err();
    assert_eq!(err.code(), "E3002");
    assert_eq!(err.rule(), Some("ENF-01"));
    match err {
        WorkflowError::ActivePhaseExists { active_phase_id } => {
            assert_eq!(active_phase_id, first.id)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(enforcer.list_phases(None).unwrap().len(), 1);
}

#[test]
fn test_enf01_terminal_phase_frees_the_slot() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);

    let first = enforcer.create_phase("One", "").unwrap();
    close(&enforcer, &first.id);
    let second = enforcer.create_phase("Two", "").unwrap();
    enforcer.abandon_phase(&second.id).unwrap();
    let third = enforcer.create_phase("Three", "").unwrap();

    assert_eq!(enforcer.active_phase().unwrap().unwrap().id, third.id);
    assert_eq!(
        enforcer
            .list_phases(Some(PhaseStatus::Active))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_enf01_promotion_blocked_leaves_idea_parked() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);

    enforcer.create_phase("Current", "").unwrap();
    let idea = enforcer.create_idea("Later", "some notes").unwrap();
    let err = enforcer.promote_idea(&idea.id, None).unwrap_err();
    assert_eq!(err.code(), "E3002");

    let reloaded = enforcer.get_idea(&idea.id).unwrap();
    assert_eq!(reloaded.status, IdeaStatus::Parked);
    assert!(reloaded.promoted_phase_id.is_none());
    assert_eq!(enforcer.list_phases(None).unwrap().len(), 1);
}

#[test]
fn test_enf01_failsafe_index_catches_bypass() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let active = enforcer.create_phase("Current", "").unwrap();

    // Repository writes skip the invariant checker; the unique index still holds.
    let rogue = Phase::new("Rogue", "", None).unwrap();
    let err = Repository::new(store.conn())
        .insert_phase(&rogue)
        .unwrap_err();
    match err {
        WorkflowError::ActivePhaseExists { active_phase_id } => {
            assert_eq!(active_phase_id, active.id)
        }
        other => panic!("unexpected error: {other}"),
    }

    let raw = store.conn().execute(
        "INSERT INTO phases(id, name, description, status, content_hash, created_at, updated_at)
         VALUES('PH_RAW', 'raw', '', 'ACTIVE', 'v1:x', 0, 0)",
        [],
    );
    assert!(raw.is_err());
}

#[test]
fn test_enf01_concurrent_creates_yield_one_active_phase() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("phaselock.db");
    // Initialize once so the racing handles only contend on the phase insert.
    drop(Store::open(&path, 5).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = Store::open(&path, 5).unwrap();
                let enforcer = Enforcer::with_defaults(&store);
                barrier.wait();
                enforcer
                    .create_phase(&format!("Racer {i}"), "")
                    .map(|p| p.id)
                    .map_err(|e| e.code())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "results: {results:?}");
    assert!(results.iter().any(|r| *r == Err("E3002")));

    let store = Store::open(&path, 5).unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    assert_eq!(
        enforcer
            .list_phases(Some(PhaseStatus::Active))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_enf02_locked_decision_is_frozen() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Use SQLite"))
        .unwrap();
    let locked = lock(&enforcer, &decision.id);
    assert_eq!(locked.status, DecisionStatus::Locked);
    assert_eq!(locked.content_hash, decision.content_hash);

    let err = enforcer
        .update_decision(&decision.id, &DecisionDraft::titled("Use Postgres"))
        .unwrap_err();
    assert_eq!(err.code(), "E4001");
    assert_eq!(err.rule(), Some("ENF-02"));

    let err = enforcer.delete_decision(&decision.id).unwrap_err();
    assert_eq!(err.code(), "E4001");

    let err = enforcer.request_lock_decision(&decision.id).unwrap_err();
    assert_eq!(err.code(), "E4001");

    assert_eq!(enforcer.get_decision(&decision.id).unwrap().title, "Use SQLite");
}

#[test]
fn test_enf02_draft_decision_is_editable() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("First take"))
        .unwrap();

    let draft = DecisionDraft {
        title: "Second take".to_string(),
        statement: "We go with the second take.".to_string(),
        rationale: "It is simpler.".to_string(),
    };
    let updated = enforcer.update_decision(&decision.id, &draft).unwrap();
    assert_ne!(updated.content_hash, decision.content_hash);
    assert_eq!(updated.status, DecisionStatus::Draft);

    enforcer.delete_decision(&decision.id).unwrap();
    assert_eq!(
        enforcer.get_decision(&decision.id).unwrap_err().code(),
        "E1002"
    );
}

#[test]
fn test_enf03_tasks_need_a_locked_decision() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Undecided"))
        .unwrap();

    let err = enforcer
        .create_task(&decision.id, "Do it", "")
        .unwrap_err();
    assert_eq!(err.code(), "E3003");
    assert_eq!(err.rule(), Some("ENF-03"));
    assert!(enforcer.list_tasks(&decision.id).unwrap().is_empty());

    lock(&enforcer, &decision.id);
    let task = enforcer.create_task(&decision.id, "Do it", "").unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
}

#[test]
fn test_enf04_no_children_under_closed_phase() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Locked before close"))
        .unwrap();
    lock(&enforcer, &decision.id);
    close(&enforcer, &phase.id);

    let err = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Too late"))
        .unwrap_err();
    assert_eq!(err.code(), "E3004");
    assert_eq!(err.rule(), Some("ENF-04"));

    let err = enforcer
        .create_document(&phase.id, "Late notes", "")
        .unwrap_err();
    assert_eq!(err.rule(), Some("ENF-04"));

    let err = enforcer
        .create_task(&decision.id, "Late task", "")
        .unwrap_err();
    assert_eq!(err.rule(), Some("ENF-04"));
}

#[test]
fn test_enf05_no_updates_under_closed_phase() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let draft = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Still a draft"))
        .unwrap();
    let locked = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Locked"))
        .unwrap();
    lock(&enforcer, &locked.id);
    let task = enforcer.create_task(&locked.id, "Work", "").unwrap();
    let doc = enforcer.create_document(&phase.id, "Notes", "v1").unwrap();
    close(&enforcer, &phase.id);

    let checks = [
        enforcer
            .update_decision(&draft.id, &DecisionDraft::titled("Edited"))
            .unwrap_err(),
        enforcer.delete_decision(&draft.id).unwrap_err(),
        enforcer.request_lock_decision(&draft.id).unwrap_err(),
        enforcer.update_task(&task.id, "Edited", "").unwrap_err(),
        enforcer.start_task(&task.id).unwrap_err(),
        enforcer.update_document(&doc.id, "Notes", "v2").unwrap_err(),
        enforcer.delete_document(&doc.id).unwrap_err(),
    ];
    for err in checks {
        assert_eq!(err.code(), "E3004", "{err}");
        assert_eq!(err.rule(), Some("ENF-05"), "{err}");
    }
    assert_eq!(enforcer.get_document(&doc.id).unwrap().content, "v1");
}

#[test]
fn test_enf06_terminal_phase_is_frozen() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let closed = enforcer.create_phase("Closed", "").unwrap();
    close(&enforcer, &closed.id);
    let abandoned = enforcer.create_phase("Abandoned", "").unwrap();
    enforcer.abandon_phase(&abandoned.id).unwrap();

    for id in [&closed.id, &abandoned.id] {
        let err = enforcer.update_phase(id, "Renamed", "").unwrap_err();
        assert_eq!(err.code(), "E4002");
        assert_eq!(err.rule(), Some("ENF-06"));
        assert_eq!(enforcer.abandon_phase(id).unwrap_err().code(), "E4002");
        assert_eq!(enforcer.request_close_phase(id).unwrap_err().code(), "E4002");
    }
}

#[test]
fn test_task_state_machine() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("D"))
        .unwrap();
    lock(&enforcer, &decision.id);
    let task = enforcer.create_task(&decision.id, "T", "").unwrap();

    let err = enforcer.complete_task(&task.id).unwrap_err();
    assert_eq!(err.code(), "E3001");
    assert!(err.to_string().contains("Allowed: IN_PROGRESS, CANCELLED"));

    enforcer.start_task(&task.id).unwrap();
    enforcer.pause_task(&task.id).unwrap();
    enforcer.start_task(&task.id).unwrap();
    let done = enforcer.complete_task(&task.id).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at.is_some());

    let err = enforcer.cancel_task(&task.id).unwrap_err();
    assert!(err.to_string().contains("Allowed: none"));
}

#[test]
fn test_violations_are_audited_after_rollback() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let active = enforcer.create_phase("P", "").unwrap();
    enforcer.create_phase("Q", "").unwrap_err();

    let violations = enforcer
        .audit()
        .by_action(AuditAction::EnforcementViolation)
        .unwrap();
    assert_eq!(violations.len(), 1);
    let entry = &violations[0];
    assert_eq!(entry.entity_type, "phase");
    assert_eq!(entry.entity_id, active.id);
    assert_eq!(entry.metadata["rule"], "ENF-01");
    assert_eq!(entry.metadata["code"], "E3002");
    assert_eq!(entry.metadata["operation"], "phase.create");
}

#[test]
fn test_violation_survives_failed_audit_write() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let active = enforcer.create_phase("P", "").unwrap();
    let draft = enforcer
        .create_decision(&active.id, &DecisionDraft::titled("D"))
        .unwrap();
    let locked = lock(&enforcer, &draft.id);
    store
        .conn()
        .execute_batch(
            "CREATE TRIGGER trg_audit_offline BEFORE INSERT ON audit_log
             BEGIN SELECT RAISE(ABORT, 'audit offline'); END;",
        )
        .unwrap();

    match enforcer.create_phase("Q", "").unwrap_err() {
        WorkflowError::ActivePhaseExists { active_phase_id } => {
            assert_eq!(active_phase_id, active.id)
        }
        other => panic!("unexpected error: {other}"),
    }
    let err = enforcer
        .update_decision(&locked.id, &DecisionDraft::titled("D2"))
        .unwrap_err();
    assert_eq!(err.code(), "E4001");

    store
        .conn()
        .execute_batch("DROP TRIGGER trg_audit_offline;")
        .unwrap();
    assert!(
        enforcer
            .audit()
            .by_action(AuditAction::EnforcementViolation)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_malformed_ids_rejected_before_lookup() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    assert_eq!(enforcer.get_phase("not-an-id").unwrap_err().code(), "E1001");
    assert_eq!(
        enforcer
            .create_decision("DC_01ARZ3NDEKTSV4RRFFQ69G5FAV", &DecisionDraft::titled("x"))
            .unwrap_err()
            .code(),
        "E1001"
    );
    assert_eq!(
        enforcer
            .get_phase("PH_01ARZ3NDEKTSV4RRFFQ69G5FAV")
            .unwrap_err()
            .code(),
        "E1002"
    );
}
