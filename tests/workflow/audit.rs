use phaselock::core::store::Store;
use phaselock::core::time;
use phaselock::workflow::audit::{AuditAction, AuditLog, NewAuditEntry};
use phaselock::workflow::decision::DecisionDraft;
use phaselock::workflow::enforcer::Enforcer;
use phaselock::workflow::repository::Repository;
use phaselock::workflow::status::IdeaStatus;
use rusqlite::params;
use serde_json::json;

#[test]
fn test_every_mutation_leaves_an_entry() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "first").unwrap();
    let renamed = enforcer.update_phase(&phase.id, "P2", "second").unwrap();

    let history = enforcer.history("phase", &phase.id).unwrap();
    let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, ["CREATE", "UPDATE"]);
    assert_eq!(history[0].new_state.as_deref(), Some("ACTIVE"));
    assert_eq!(history[0].metadata["actor"], "phaselock");
    assert_eq!(history[1].metadata["old_hash"], phase.content_hash.as_str());
    assert_eq!(history[1].metadata["new_hash"], renamed.content_hash.as_str());
}

#[test]
fn test_actor_comes_from_config() {
    let store = Store::open_in_memory().unwrap();
    let mut config = phaselock::core::config::Config::default();
    config.actor = "ci-bot".to_string();
    let enforcer = Enforcer::new(&store, &config);
    let idea = enforcer.create_idea("I", "").unwrap();
    let entries = enforcer.history("idea", &idea.id).unwrap();
    assert_eq!(entries[0].metadata["actor"], "ci-bot");
}

#[test]
fn test_rows_cannot_be_updated_or_deleted() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    enforcer.create_idea("I", "").unwrap();
    let entry = enforcer.audit().recent(1).unwrap().remove(0);

    let update = store.conn().execute(
        "UPDATE audit_log SET action = 'NOTHING' WHERE id = ?1",
        params![entry.id],
    );
    let err = update.unwrap_err().to_string();
    assert!(err.contains("append-only"), "{err}");

    let delete = store
        .conn()
        .execute("DELETE FROM audit_log WHERE id = ?1", params![entry.id]);
    assert!(delete.is_err());

    assert_eq!(enforcer.audit().get(&entry.id).unwrap(), entry);
}

#[test]
fn test_corrupt_metadata_fails_the_read() {
    let store = Store::open_in_memory().unwrap();
    let log = AuditLog::new(store.conn());
    log.append(NewAuditEntry::new("phase", "PH_A", AuditAction::Create))
        .unwrap();
    store
        .conn()
        .execute(
            "INSERT INTO audit_log(id, entity_type, entity_id, action, metadata, created_at)
             VALUES('AL_BROKEN', 'phase', 'PH_A', 'UPDATE', '{not json', 0)",
            [],
        )
        .unwrap();

    assert_eq!(log.get("AL_BROKEN").unwrap_err().code(), "E9001");
    assert_eq!(log.recent(10).unwrap_err().code(), "E9001");
    assert_eq!(log.for_entity("phase", "PH_A").unwrap_err().code(), "E9001");
    // Rows that are not touched by the corrupt one still read.
    assert_eq!(log.by_action(AuditAction::Create).unwrap().len(), 1);
}

#[test]
fn test_queries() {
    let store = Store::open_in_memory().unwrap();
    let log = AuditLog::new(store.conn());
    let before = time::now_millis();
    for i in 0..3 {
        log.append(
            NewAuditEntry::new("phase", "PH_A", AuditAction::Update)
                .metadata(json!({ "n": i })),
        )
        .unwrap();
    }
    log.append(NewAuditEntry::new("phase", "PH_B", AuditAction::Create))
        .unwrap();
    let after = time::now_millis();

    assert_eq!(log.count().unwrap(), 4);
    assert_eq!(log.count_for_entity("phase", "PH_A").unwrap(), 3);
    assert_eq!(log.by_action(AuditAction::Create).unwrap().len(), 1);
    assert_eq!(log.in_range(before, after).unwrap().len(), 4);
    assert!(log.in_range(after + 1, after + 2).unwrap().is_empty());
    assert_eq!(log.in_range(after, before - 1).unwrap_err().code(), "E1001");

    let recent = log.recent(2).unwrap();
    assert_eq!(recent[0].entity_id, "PH_B");
    assert_eq!(recent[1].metadata["n"], 2);

    let oldest_first = log.for_entity("phase", "PH_A").unwrap();
    assert_eq!(oldest_first[0].metadata["n"], 0);
}

#[test]
fn test_action_names_parse() {
    assert_eq!(
        AuditAction::parse("enforcement_violation").unwrap(),
        AuditAction::EnforcementViolation
    );
    assert_eq!(AuditAction::parse("nope").unwrap_err().code(), "E1001");
}

#[test]
fn test_rejections_are_recorded_against_the_blocking_entity() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Draft"))
        .unwrap();
    enforcer.create_task(&decision.id, "T", "").unwrap_err();

    let history = enforcer.history("decision", &decision.id).unwrap();
    let violation = history.last().unwrap();
    assert_eq!(violation.action, "ENFORCEMENT_VIOLATION");
    assert_eq!(violation.metadata["rule"], "ENF-03");
    assert_eq!(violation.metadata["operation"], "task.create");
}

#[test]
fn test_token_and_validation_errors_are_not_audited() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("P", "").unwrap();
    let baseline = enforcer.audit().count().unwrap();

    enforcer
        .confirm_close_phase(&phase.id, "CT_01ARZ3NDEKTSV4RRFFQ69G5FAV", "CLOSE")
        .unwrap_err();
    enforcer.create_idea("", "").unwrap_err();

    assert_eq!(enforcer.audit().count().unwrap(), baseline);
}

#[test]
fn test_direct_status_write_bypasses_enforcement() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let idea = enforcer.create_idea("I", "").unwrap();
    let before = enforcer.audit().count().unwrap();

    // Legal for the repository even though PARKED -> PROMOTED normally creates a phase.
    Repository::new(store.conn())
        .update_idea_status(&idea.id, IdeaStatus::Promoted)
        .unwrap();

    assert_eq!(enforcer.get_idea(&idea.id).unwrap().status, IdeaStatus::Promoted);
    assert_eq!(enforcer.audit().count().unwrap(), before);
}
