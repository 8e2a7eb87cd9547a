use phaselock::core::store::Store;
use phaselock::workflow::decision::DecisionDraft;
use phaselock::workflow::enforcer::Enforcer;
use phaselock::workflow::status::{DecisionStatus, IdeaStatus, Lifecycle, PhaseStatus, TaskStatus};
use tempfile::tempdir;

#[test]
fn test_idea_promotion_respects_single_active_phase() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);

    let build_x = enforcer.create_idea("Build X", "").unwrap();
    assert_eq!(build_x.status, IdeaStatus::Parked);

    let (promoted, phase) = enforcer.promote_idea(&build_x.id, None).unwrap();
    assert_eq!(promoted.status, IdeaStatus::Promoted);
    assert_eq!(promoted.promoted_phase_id.as_deref(), Some(phase.id.as_str()));
    assert_eq!(phase.status, PhaseStatus::Active);
    assert_eq!(phase.name, "Build X");
    assert_eq!(phase.source_idea_id.as_deref(), Some(build_x.id.as_str()));
    assert_eq!(enforcer.list_phases(None).unwrap().len(), 1);

    let build_z = enforcer.create_idea("Build Z", "").unwrap();
    let err = enforcer.promote_idea(&build_z.id, None).unwrap_err();
    assert_eq!(err.code(), "E3002");

    let token = enforcer.request_close_phase(&phase.id).unwrap();
    enforcer
        .confirm_close_phase(&phase.id, &token.token, "CLOSE")
        .unwrap();

    let (promoted_z, phase_z) = enforcer
        .promote_idea(&build_z.id, Some("Z, take one"))
        .unwrap();
    assert_eq!(promoted_z.status, IdeaStatus::Promoted);
    assert_eq!(phase_z.name, "Z, take one");
    assert_eq!(enforcer.active_phase().unwrap().unwrap().id, phase_z.id);

    // A promoted idea cannot be promoted or abandoned again.
    assert_eq!(
        enforcer.promote_idea(&build_x.id, None).unwrap_err().code(),
        "E3001"
    );
    assert_eq!(enforcer.abandon_idea(&build_x.id).unwrap_err().code(), "E3001");
}

#[test]
fn test_decision_lock_to_task_completion() {
    let tmp = tempdir().unwrap();
    let store = Store::open(&tmp.path().join("phaselock.db"), 5).unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("Delivery", "").unwrap();

    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("Use Y"))
        .unwrap();
    assert_eq!(decision.status, DecisionStatus::Draft);

    let token = enforcer.request_lock_decision(&decision.id).unwrap();
    let locked = enforcer
        .confirm_lock_decision(&decision.id, &token.token, &token.confirmation)
        .unwrap();
    assert_eq!(locked.status, DecisionStatus::Locked);
    assert!(locked.content_hash.starts_with("v1:"));
    assert!(locked.locked_at.is_some());

    assert!(
        enforcer
            .update_decision(&decision.id, &DecisionDraft::titled("Use Z"))
            .is_err()
    );

    let task = enforcer
        .create_task(&decision.id, "Wire up Y", "")
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(
        enforcer.start_task(&task.id).unwrap().status,
        TaskStatus::InProgress
    );
    let done = enforcer.complete_task(&task.id).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.status.is_terminal());
    for target in TaskStatus::ALL {
        assert!(!done.status.can_transition(*target));
    }
}

#[test]
fn test_reset_phase_removes_owned_rows_but_keeps_history() {
    let store = Store::open_in_memory().unwrap();
    let enforcer = Enforcer::with_defaults(&store);
    let phase = enforcer.create_phase("Throwaway", "").unwrap();
    let decision = enforcer
        .create_decision(&phase.id, &DecisionDraft::titled("D"))
        .unwrap();
    let doc = enforcer.create_document(&phase.id, "Doc", "x").unwrap();

    enforcer.reset_phase(&phase.id).unwrap();

    assert_eq!(enforcer.get_phase(&phase.id).unwrap_err().code(), "E1002");
    assert_eq!(enforcer.get_decision(&decision.id).unwrap_err().code(), "E1002");
    assert_eq!(enforcer.get_document(&doc.id).unwrap_err().code(), "E1002");
    assert!(enforcer.active_phase().unwrap().is_none());

    let history = enforcer.history("phase", &phase.id).unwrap();
    assert_eq!(history.first().unwrap().action, "CREATE");
    assert_eq!(history.last().unwrap().action, "DELETE");
    assert_eq!(enforcer.history("decision", &decision.id).unwrap().len(), 1);

    enforcer.create_phase("Fresh start", "").unwrap();
}
