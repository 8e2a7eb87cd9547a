//! The single entry point for workflow mutations.
//!
//! Each operation runs in one store transaction: load current state (hash verified),
//! check the invariants, apply the entity's transition, write it back, append the
//! audit entry. A rejected operation rolls back, then its violation is appended to
//! the audit log in a separate write so the rejection itself survives. Errors are
//! returned unchanged.

use crate::core::config::Config;
use crate::core::error::{Result, WorkflowError};
use crate::core::store::Store;
use crate::core::time;
use crate::workflow::audit::{AuditAction, AuditEntry, AuditLog, NewAuditEntry};
use crate::workflow::confirm::{ConfirmAction, ConfirmationToken, STORE_ENTITY_ID, TokenGate};
use crate::workflow::decision::{self, Decision, DecisionDraft};
use crate::workflow::document::{self, Document, DocumentSnapshot};
use crate::workflow::idea::{self, Idea};
use crate::workflow::invariants::InvariantChecker;
use crate::workflow::phase::{self, Phase};
use crate::workflow::repository::Repository;
use crate::workflow::status::{IdeaStatus, Lifecycle, PhaseStatus, TaskStatus};
use crate::workflow::task::{self, Task};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

/// External backup collaborator. Runs inside the restore transaction; the restored
/// rows are hash-verified before the transaction commits.
pub trait RestoreSource {
    fn describe(&self) -> String;
    fn restore_into(&self, conn: &Connection) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseClosure {
    pub phase: Phase,
    pub snapshots: Vec<DocumentSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub source: String,
    pub rows_verified: usize,
}

/// Entity an operation is aimed at; violations without a more specific subject are
/// recorded against it.
type Target<'a> = (&'static str, &'a str);

fn violation_subject(err: &WorkflowError) -> Option<(&'static str, &str)> {
    match err {
        WorkflowError::ActivePhaseExists { active_phase_id } => {
            Some((phase::ENTITY, active_phase_id.as_str()))
        }
        WorkflowError::DecisionNotLocked { decision_id, .. }
        | WorkflowError::LockedDecisionImmutable { decision_id } => {
            Some((decision::ENTITY, decision_id.as_str()))
        }
        WorkflowError::PhaseNotActive { phase_id, .. }
        | WorkflowError::ClosedPhaseImmutable { phase_id, .. } => {
            Some((phase::ENTITY, phase_id.as_str()))
        }
        WorkflowError::HashVerification {
            entity_type,
            entity_id,
            ..
        } => Some((*entity_type, entity_id.as_str())),
        _ => None,
    }
}

pub struct Enforcer<'s> {
    store: &'s Store,
    actor: String,
    token_ttl_secs: u64,
}

impl<'s> Enforcer<'s> {
    pub fn new(store: &'s Store, config: &Config) -> Self {
        Self {
            store,
            actor: config.actor.clone(),
            token_ttl_secs: config.confirm.token_ttl_secs,
        }
    }

    pub fn with_defaults(store: &'s Store) -> Self {
        Self::new(store, &Config::default())
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Read-only view of the audit trail.
    pub fn audit(&self) -> AuditLog<'s> {
        AuditLog::new(self.store.conn())
    }

    // --- plumbing ---

    fn mutate<T, F>(&self, op: &str, target: Target<'_>, f: F) -> Result<T>
    where
        F: FnOnce(&Repository<'_>, &AuditLog<'_>) -> Result<T>,
    {
        let result = self.store.with_write(op, |conn| {
            let repo = Repository::new(conn);
            let audit = AuditLog::new(conn);
            f(&repo, &audit)
        });
        if let Err(err) = &result {
            self.record_rejection(op, target, err);
        }
        result
    }

    fn read<T, F>(&self, op: &str, target: Target<'_>, f: F) -> Result<T>
    where
        F: FnOnce(&Repository<'_>) -> Result<T>,
    {
        let result = self
            .store
            .with_read(op, |conn| f(&Repository::new(conn)));
        if let Err(err) = &result {
            self.record_rejection(op, target, err);
        }
        result
    }

    /// Appends ENFORCEMENT_VIOLATION or INTEGRITY_VIOLATION for audited failures.
    /// Anything else (validation, not found, token errors) is only traced. A failed
    /// audit write is logged; the caller still gets the original error.
    fn record_rejection(&self, op: &str, target: Target<'_>, err: &WorkflowError) {
        let action = if let Some(rule) = err.rule() {
            tracing::warn!(op, rule, code = err.code(), reason = %err, "enforcement violation");
            (AuditAction::EnforcementViolation, Some(rule))
        } else if err.is_integrity_failure() {
            (AuditAction::IntegrityViolation, None)
        } else {
            tracing::debug!(op, code = err.code(), reason = %err, "operation rejected");
            return;
        };

        let (entity_type, entity_id) = violation_subject(err).unwrap_or(target);
        let metadata = json!({
            "rule": action.1,
            "code": err.code(),
            "reason": err.to_string(),
            "operation": op,
            "target_type": target.0,
            "target_id": target.1,
            "actor": self.actor,
        });
        let recorded = self.store.with_write("audit.violation", |conn| {
            AuditLog::new(conn).append(
                NewAuditEntry::new(entity_type, entity_id, action.0).metadata(metadata),
            )?;
            Ok(())
        });
        if let Err(audit_err) = recorded {
            tracing::error!(
                op,
                code = err.code(),
                audit_code = audit_err.code(),
                reason = %audit_err,
                "failed to record rejected operation in audit log"
            );
        }
    }

    fn meta(&self, extra: serde_json::Value) -> serde_json::Value {
        let mut base = json!({ "actor": self.actor });
        if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                base_obj.insert(k.clone(), v.clone());
            }
        }
        base
    }

    fn gate<'c>(&self, conn: &'c Connection) -> TokenGate<'c> {
        TokenGate::new(conn, self.token_ttl_secs)
    }

    fn issue_token(
        &self,
        op: &str,
        target: Target<'_>,
        action: ConfirmAction,
        check: impl FnOnce(&Repository<'_>) -> Result<()>,
    ) -> Result<ConfirmationToken> {
        let result = self.store.with_write(op, |conn| {
            check(&Repository::new(conn))?;
            self.gate(conn).issue(action, target.1)
        });
        if let Err(err) = &result {
            self.record_rejection(op, target, err);
        }
        result
    }

    // --- ideas ---

    pub fn create_idea(&self, title: &str, content: &str) -> Result<Idea> {
        let idea = Idea::new(title, content)?;
        self.mutate("idea.create", ("idea", idea.id.as_str()), |repo, audit| {
            repo.insert_idea(&idea)?;
            audit.append(
                NewAuditEntry::new("idea", &idea.id, AuditAction::Create)
                    .states(None, Some(idea.status.as_str()))
                    .metadata(self.meta(json!({ "title": idea.title }))),
            )?;
            Ok(())
        })?;
        Ok(idea)
    }

    /// Promotes a PARKED idea into a new ACTIVE phase (ENF-01).
    pub fn promote_idea(&self, idea_id: &str, phase_name: Option<&str>) -> Result<(Idea, Phase)> {
        time::validate_id(idea::ID_PREFIX, idea_id)?;
        self.mutate("idea.promote", ("idea", idea_id), |repo, audit| {
            let idea = repo.find_idea(idea_id)?;
            idea.status.validate_transition(IdeaStatus::Promoted)?;
            InvariantChecker::new(repo).single_active_phase()?;

            let phase = Phase::new(
                phase_name.unwrap_or(&idea.title),
                &idea.content,
                Some(idea.id.as_str()),
            )?;
            repo.insert_phase(&phase)?;
            let old_status = idea.status;
            let promoted = idea.promote(&phase.id)?;
            repo.update_idea(&promoted)?;

            audit.append(
                NewAuditEntry::new(phase::ENTITY, &phase.id, AuditAction::Create)
                    .states(None, Some(phase.status.as_str()))
                    .metadata(self.meta(json!({
                        "content_hash": phase.content_hash,
                        "source_idea_id": promoted.id,
                    }))),
            )?;
            audit.append(
                NewAuditEntry::new("idea", &promoted.id, AuditAction::Transition)
                    .states(Some(old_status.as_str()), Some(promoted.status.as_str()))
                    .metadata(self.meta(json!({ "phase_id": phase.id }))),
            )?;
            tracing::info!(idea_id = %promoted.id, phase_id = %phase.id, "idea promoted");
            Ok((promoted, phase))
        })
    }

    pub fn abandon_idea(&self, idea_id: &str) -> Result<Idea> {
        time::validate_id(idea::ID_PREFIX, idea_id)?;
        self.mutate("idea.abandon", ("idea", idea_id), |repo, audit| {
            let idea = repo.find_idea(idea_id)?;
            let old_status = idea.status;
            let abandoned = idea.abandon()?;
            repo.update_idea(&abandoned)?;
            audit.append(
                NewAuditEntry::new("idea", &abandoned.id, AuditAction::Transition)
                    .states(Some(old_status.as_str()), Some(abandoned.status.as_str()))
                    .metadata(self.meta(json!({}))),
            )?;
            Ok(abandoned)
        })
    }

    pub fn get_idea(&self, idea_id: &str) -> Result<Idea> {
        time::validate_id(idea::ID_PREFIX, idea_id)?;
        self.read("idea.get", ("idea", idea_id), |repo| repo.find_idea(idea_id))
    }

    pub fn list_ideas(&self, status: Option<IdeaStatus>) -> Result<Vec<Idea>> {
        self.read("idea.list", ("idea", ""), |repo| repo.list_ideas(status))
    }

    // --- phases ---

    /// ENF-01.
    pub fn create_phase(&self, name: &str, description: &str) -> Result<Phase> {
        let phase = Phase::new(name, description, None)?;
        self.mutate("phase.create", (phase::ENTITY, phase.id.as_str()), |repo, audit| {
            InvariantChecker::new(repo).single_active_phase()?;
            repo.insert_phase(&phase)?;
            audit.append(
                NewAuditEntry::new(phase::ENTITY, &phase.id, AuditAction::Create)
                    .states(None, Some(phase.status.as_str()))
                    .metadata(self.meta(json!({ "content_hash": phase.content_hash }))),
            )?;
            tracing::info!(phase_id = %phase.id, "phase created");
            Ok(())
        })?;
        Ok(phase)
    }

    /// ENF-06.
    pub fn update_phase(&self, phase_id: &str, name: &str, description: &str) -> Result<Phase> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("phase.update", (phase::ENTITY, phase_id), |repo, audit| {
            let current = InvariantChecker::new(repo).phase_mutable(phase_id)?;
            let old_hash = current.content_hash.clone();
            let updated = current.revise(name, description)?;
            repo.update_phase(&updated)?;
            audit.append(
                NewAuditEntry::new(phase::ENTITY, &updated.id, AuditAction::Update)
                    .states(Some(updated.status.as_str()), Some(updated.status.as_str()))
                    .metadata(self.meta(json!({
                        "old_hash": old_hash,
                        "new_hash": updated.content_hash,
                    }))),
            )?;
            Ok(updated)
        })
    }

    /// ENF-06, then ACTIVE -> ABANDONED.
    pub fn abandon_phase(&self, phase_id: &str) -> Result<Phase> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("phase.abandon", (phase::ENTITY, phase_id), |repo, audit| {
            let current = InvariantChecker::new(repo).phase_mutable(phase_id)?;
            let old_status = current.status;
            let abandoned = current.abandon()?;
            repo.update_phase(&abandoned)?;
            audit.append(
                NewAuditEntry::new(phase::ENTITY, &abandoned.id, AuditAction::Transition)
                    .states(Some(old_status.as_str()), Some(abandoned.status.as_str()))
                    .metadata(self.meta(json!({}))),
            )?;
            tracing::info!(phase_id = %abandoned.id, "phase abandoned");
            Ok(abandoned)
        })
    }

    /// Step one of closing a phase. No domain effect.
    pub fn request_close_phase(&self, phase_id: &str) -> Result<ConfirmationToken> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.issue_token(
            "phase.close.request",
            (phase::ENTITY, phase_id),
            ConfirmAction::ClosePhase,
            |repo| InvariantChecker::new(repo).phase_mutable(phase_id).map(|_| ()),
        )
    }

    /// Step two: snapshot every document, flip the phase to CLOSED and spend the token,
    /// all in one transaction.
    pub fn confirm_close_phase(
        &self,
        phase_id: &str,
        token: &str,
        confirmation: &str,
    ) -> Result<PhaseClosure> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("phase.close", (phase::ENTITY, phase_id), |repo, audit| {
            let gate = self.gate(repo.conn());
            gate.ensure_unspent(ConfirmAction::ClosePhase, phase_id, token)?;
            let current = InvariantChecker::new(repo).phase_mutable(phase_id)?;
            gate.consume(ConfirmAction::ClosePhase, phase_id, token, confirmation)?;

            let mut snapshots = Vec::new();
            for doc in repo.list_documents(phase_id)? {
                let snapshot = doc.snapshot();
                repo.insert_snapshot(&snapshot)?;
                audit.append(
                    NewAuditEntry::new(document::ENTITY, &doc.id, AuditAction::Snapshot)
                        .metadata(self.meta(json!({
                            "snapshot_id": snapshot.id,
                            "content_hash": snapshot.content_hash,
                        }))),
                )?;
                snapshots.push(snapshot);
            }

            let old_status = current.status;
            let closed = current.close()?;
            repo.update_phase(&closed)?;
            audit.append(
                NewAuditEntry::new(phase::ENTITY, &closed.id, AuditAction::Transition)
                    .states(Some(old_status.as_str()), Some(closed.status.as_str()))
                    .metadata(self.meta(json!({ "snapshots": snapshots.len() }))),
            )?;
            tracing::info!(phase_id = %closed.id, snapshots = snapshots.len(), "phase closed");
            Ok(PhaseClosure {
                phase: closed,
                snapshots,
            })
        })
    }

    /// Deletes a phase and everything it owns. Reset/test path only; snapshots and
    /// audit entries survive.
    pub fn reset_phase(&self, phase_id: &str) -> Result<()> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("phase.reset", (phase::ENTITY, phase_id), |repo, audit| {
            let current = repo.find_phase(phase_id)?;
            repo.delete_phase(phase_id)?;
            audit.append(
                NewAuditEntry::new(phase::ENTITY, phase_id, AuditAction::Delete)
                    .states(Some(current.status.as_str()), None)
                    .metadata(self.meta(json!({ "content_hash": current.content_hash }))),
            )?;
            tracing::warn!(phase_id, "phase reset");
            Ok(())
        })
    }

    pub fn get_phase(&self, phase_id: &str) -> Result<Phase> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.read("phase.get", (phase::ENTITY, phase_id), |repo| {
            repo.find_phase(phase_id)
        })
    }

    pub fn active_phase(&self) -> Result<Option<Phase>> {
        self.read("phase.active", (phase::ENTITY, ""), |repo| {
            repo.find_active_phase()
        })
    }

    pub fn list_phases(&self, status: Option<PhaseStatus>) -> Result<Vec<Phase>> {
        self.read("phase.list", (phase::ENTITY, ""), |repo| {
            repo.list_phases(status)
        })
    }

    pub fn list_snapshots(&self, phase_id: &str) -> Result<Vec<DocumentSnapshot>> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.read("snapshot.list", (phase::ENTITY, phase_id), |repo| {
            repo.list_snapshots(phase_id)
        })
    }

    // --- decisions ---

    /// ENF-04.
    pub fn create_decision(&self, phase_id: &str, draft: &DecisionDraft) -> Result<Decision> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("decision.create", (phase::ENTITY, phase_id), |repo, audit| {
            InvariantChecker::new(repo).phase_accepts_children(phase_id)?;
            let decision = Decision::new(phase_id, draft)?;
            repo.insert_decision(&decision)?;
            audit.append(
                NewAuditEntry::new(decision::ENTITY, &decision.id, AuditAction::Create)
                    .states(None, Some(decision.status.as_str()))
                    .metadata(self.meta(json!({
                        "phase_id": phase_id,
                        "content_hash": decision.content_hash,
                    }))),
            )?;
            Ok(decision)
        })
    }

    /// ENF-02, ENF-05.
    pub fn update_decision(&self, decision_id: &str, draft: &DecisionDraft) -> Result<Decision> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.mutate(
            "decision.update",
            (decision::ENTITY, decision_id),
            |repo, audit| {
                let checker = InvariantChecker::new(repo);
                let current = checker.decision_mutable(decision_id)?;
                checker.phase_allows_updates(&current.phase_id)?;
                let old_hash = current.content_hash.clone();
                let updated = current.revise(draft)?;
                repo.update_decision(&updated)?;
                audit.append(
                    NewAuditEntry::new(decision::ENTITY, &updated.id, AuditAction::Update)
                        .states(Some(updated.status.as_str()), Some(updated.status.as_str()))
                        .metadata(self.meta(json!({
                            "old_hash": old_hash,
                            "new_hash": updated.content_hash,
                        }))),
                )?;
                Ok(updated)
            },
        )
    }

    /// ENF-02, ENF-05. Cascades to the decision's tasks.
    pub fn delete_decision(&self, decision_id: &str) -> Result<()> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.mutate(
            "decision.delete",
            (decision::ENTITY, decision_id),
            |repo, audit| {
                let checker = InvariantChecker::new(repo);
                let current = checker.decision_mutable(decision_id)?;
                checker.phase_allows_updates(&current.phase_id)?;
                repo.delete_decision(decision_id)?;
                audit.append(
                    NewAuditEntry::new(decision::ENTITY, decision_id, AuditAction::Delete)
                        .states(Some(current.status.as_str()), None)
                        .metadata(self.meta(json!({ "content_hash": current.content_hash }))),
                )?;
                Ok(())
            },
        )
    }

    /// Step one of locking. ENF-02 and ENF-05 are checked before a token is issued.
    pub fn request_lock_decision(&self, decision_id: &str) -> Result<ConfirmationToken> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.issue_token(
            "decision.lock.request",
            (decision::ENTITY, decision_id),
            ConfirmAction::LockDecision,
            |repo| {
                let checker = InvariantChecker::new(repo);
                let current = checker.decision_mutable(decision_id)?;
                checker.phase_allows_updates(&current.phase_id).map(|_| ())
            },
        )
    }

    pub fn confirm_lock_decision(
        &self,
        decision_id: &str,
        token: &str,
        confirmation: &str,
    ) -> Result<Decision> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.mutate(
            "decision.lock",
            (decision::ENTITY, decision_id),
            |repo, audit| {
                let gate = self.gate(repo.conn());
                gate.ensure_unspent(ConfirmAction::LockDecision, decision_id, token)?;
                let checker = InvariantChecker::new(repo);
                let current = checker.decision_mutable(decision_id)?;
                checker.phase_allows_updates(&current.phase_id)?;
                gate.consume(ConfirmAction::LockDecision, decision_id, token, confirmation)?;
                let old_status = current.status;
                let locked = current.lock()?;
                repo.update_decision(&locked)?;
                audit.append(
                    NewAuditEntry::new(decision::ENTITY, &locked.id, AuditAction::Transition)
                        .states(Some(old_status.as_str()), Some(locked.status.as_str()))
                        .metadata(self.meta(json!({ "content_hash": locked.content_hash }))),
                )?;
                tracing::info!(decision_id = %locked.id, "decision locked");
                Ok(locked)
            },
        )
    }

    pub fn get_decision(&self, decision_id: &str) -> Result<Decision> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.read("decision.get", (decision::ENTITY, decision_id), |repo| {
            repo.find_decision(decision_id)
        })
    }

    pub fn list_decisions(&self, phase_id: &str) -> Result<Vec<Decision>> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.read("decision.list", (phase::ENTITY, phase_id), |repo| {
            repo.list_decisions(phase_id)
        })
    }

    // --- tasks ---

    /// ENF-03, plus ENF-04 on the decision's phase.
    pub fn create_task(&self, decision_id: &str, title: &str, description: &str) -> Result<Task> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.mutate(
            "task.create",
            (decision::ENTITY, decision_id),
            |repo, audit| {
                let checker = InvariantChecker::new(repo);
                let parent = checker.task_provenance(decision_id)?;
                checker.phase_accepts_children(&parent.phase_id)?;
                let task = Task::new(decision_id, title, description)?;
                repo.insert_task(&task)?;
                audit.append(
                    NewAuditEntry::new(task::ENTITY, &task.id, AuditAction::Create)
                        .states(None, Some(task.status.as_str()))
                        .metadata(self.meta(json!({
                            "decision_id": decision_id,
                            "content_hash": task.content_hash,
                        }))),
                )?;
                Ok(task)
            },
        )
    }

    /// ENF-05.
    pub fn update_task(&self, task_id: &str, title: &str, description: &str) -> Result<Task> {
        time::validate_id(task::ID_PREFIX, task_id)?;
        self.mutate("task.update", (task::ENTITY, task_id), |repo, audit| {
            let current = repo.find_task(task_id)?;
            self.task_phase_allows_updates(repo, &current)?;
            let old_hash = current.content_hash.clone();
            let updated = current.revise(title, description)?;
            repo.update_task(&updated)?;
            audit.append(
                NewAuditEntry::new(task::ENTITY, &updated.id, AuditAction::Update)
                    .states(Some(updated.status.as_str()), Some(updated.status.as_str()))
                    .metadata(self.meta(json!({
                        "old_hash": old_hash,
                        "new_hash": updated.content_hash,
                    }))),
            )?;
            Ok(updated)
        })
    }

    /// ENF-05, then the task state machine.
    pub fn transition_task(&self, task_id: &str, to: TaskStatus) -> Result<Task> {
        time::validate_id(task::ID_PREFIX, task_id)?;
        self.mutate("task.transition", (task::ENTITY, task_id), |repo, audit| {
            let current = repo.find_task(task_id)?;
            self.task_phase_allows_updates(repo, &current)?;
            let old_status = current.status;
            let moved = current.transition(to)?;
            repo.update_task(&moved)?;
            audit.append(
                NewAuditEntry::new(task::ENTITY, &moved.id, AuditAction::Transition)
                    .states(Some(old_status.as_str()), Some(moved.status.as_str()))
                    .metadata(self.meta(json!({}))),
            )?;
            Ok(moved)
        })
    }

    pub fn start_task(&self, task_id: &str) -> Result<Task> {
        self.transition_task(task_id, TaskStatus::InProgress)
    }

    pub fn pause_task(&self, task_id: &str) -> Result<Task> {
        self.transition_task(task_id, TaskStatus::Pending)
    }

    pub fn complete_task(&self, task_id: &str) -> Result<Task> {
        self.transition_task(task_id, TaskStatus::Completed)
    }

    pub fn cancel_task(&self, task_id: &str) -> Result<Task> {
        self.transition_task(task_id, TaskStatus::Cancelled)
    }

    fn task_phase_allows_updates(&self, repo: &Repository<'_>, task: &Task) -> Result<()> {
        let parent = repo.find_decision(&task.decision_id)?;
        InvariantChecker::new(repo)
            .phase_allows_updates(&parent.phase_id)
            .map(|_| ())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task> {
        time::validate_id(task::ID_PREFIX, task_id)?;
        self.read("task.get", (task::ENTITY, task_id), |repo| {
            repo.find_task(task_id)
        })
    }

    pub fn list_tasks(&self, decision_id: &str) -> Result<Vec<Task>> {
        time::validate_id(decision::ID_PREFIX, decision_id)?;
        self.read("task.list", (decision::ENTITY, decision_id), |repo| {
            repo.list_tasks(decision_id)
        })
    }

    // --- documents ---

    /// ENF-04.
    pub fn create_document(&self, phase_id: &str, title: &str, content: &str) -> Result<Document> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.mutate("document.create", (phase::ENTITY, phase_id), |repo, audit| {
            InvariantChecker::new(repo).phase_accepts_children(phase_id)?;
            let doc = Document::new(phase_id, title, content)?;
            repo.insert_document(&doc)?;
            audit.append(
                NewAuditEntry::new(document::ENTITY, &doc.id, AuditAction::Create)
                    .metadata(self.meta(json!({
                        "phase_id": phase_id,
                        "content_hash": doc.content_hash,
                    }))),
            )?;
            Ok(doc)
        })
    }

    /// ENF-05.
    pub fn update_document(&self, document_id: &str, title: &str, content: &str) -> Result<Document> {
        time::validate_id(document::ID_PREFIX, document_id)?;
        self.mutate(
            "document.update",
            (document::ENTITY, document_id),
            |repo, audit| {
                let current = repo.find_document(document_id)?;
                InvariantChecker::new(repo).phase_allows_updates(&current.phase_id)?;
                let old_hash = current.content_hash.clone();
                let updated = current.revise(title, content)?;
                repo.update_document(&updated)?;
                audit.append(
                    NewAuditEntry::new(document::ENTITY, &updated.id, AuditAction::Update)
                        .metadata(self.meta(json!({
                            "old_hash": old_hash,
                            "new_hash": updated.content_hash,
                        }))),
                )?;
                Ok(updated)
            },
        )
    }

    /// ENF-05.
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        time::validate_id(document::ID_PREFIX, document_id)?;
        self.mutate(
            "document.delete",
            (document::ENTITY, document_id),
            |repo, audit| {
                let current = repo.find_document(document_id)?;
                InvariantChecker::new(repo).phase_allows_updates(&current.phase_id)?;
                repo.delete_document(document_id)?;
                audit.append(
                    NewAuditEntry::new(document::ENTITY, document_id, AuditAction::Delete)
                        .metadata(self.meta(json!({ "content_hash": current.content_hash }))),
                )?;
                Ok(())
            },
        )
    }

    pub fn get_document(&self, document_id: &str) -> Result<Document> {
        time::validate_id(document::ID_PREFIX, document_id)?;
        self.read("document.get", (document::ENTITY, document_id), |repo| {
            repo.find_document(document_id)
        })
    }

    pub fn list_documents(&self, phase_id: &str) -> Result<Vec<Document>> {
        time::validate_id(phase::ID_PREFIX, phase_id)?;
        self.read("document.list", (phase::ENTITY, phase_id), |repo| {
            repo.list_documents(phase_id)
        })
    }

    // --- restore ---

    pub fn request_restore(&self) -> Result<ConfirmationToken> {
        self.issue_token(
            "store.restore.request",
            ("store", STORE_ENTITY_ID),
            ConfirmAction::Restore,
            |_| Ok(()),
        )
    }

    /// Spends the token, runs the collaborator, then verifies every hashed row before
    /// committing. A tampered backup aborts the whole restore.
    pub fn confirm_restore(
        &self,
        token: &str,
        confirmation: &str,
        source: &dyn RestoreSource,
    ) -> Result<RestoreReport> {
        self.mutate(
            "store.restore",
            ("store", STORE_ENTITY_ID),
            |repo, audit| {
                self.gate(repo.conn()).consume(
                    ConfirmAction::Restore,
                    STORE_ENTITY_ID,
                    token,
                    confirmation,
                )?;
                let description = source.describe();
                source.restore_into(repo.conn())?;
                let rows_verified = repo.verify_all()?;
                audit.append(
                    NewAuditEntry::new("store", STORE_ENTITY_ID, AuditAction::Restore)
                        .metadata(self.meta(json!({
                            "source": description,
                            "rows_verified": rows_verified,
                        }))),
                )?;
                tracing::warn!(source = %description, rows_verified, "store restored");
                Ok(RestoreReport {
                    source: description,
                    rows_verified,
                })
            },
        )
    }

    /// Re-reads every hashed row. The first mismatch is returned and audited.
    pub fn verify_all(&self) -> Result<usize> {
        self.read("store.verify", ("store", STORE_ENTITY_ID), |repo| {
            repo.verify_all()
        })
    }

    pub fn history(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEntry>> {
        self.audit().for_entity(entity_type, entity_id)
    }
}
