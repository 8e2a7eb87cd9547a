//! The six enforcement rules.
//!
//! Each check loads current state through the repository, so hash verification runs
//! first and caller-supplied entity values are never trusted. Checks return the
//! loaded entity so the caller can apply its transition to exactly what was checked.

use crate::core::error::{Result, WorkflowError};
use crate::workflow::decision::Decision;
use crate::workflow::phase::Phase;
use crate::workflow::repository::Repository;
use crate::workflow::status::{Lifecycle, PhaseStatus};

pub const ENF_01: &str = "ENF-01";
pub const ENF_02: &str = "ENF-02";
pub const ENF_03: &str = "ENF-03";
pub const ENF_04: &str = "ENF-04";
pub const ENF_05: &str = "ENF-05";
pub const ENF_06: &str = "ENF-06";

pub struct InvariantChecker<'r, 'c> {
    repo: &'r Repository<'c>,
}

impl<'r, 'c> InvariantChecker<'r, 'c> {
    pub fn new(repo: &'r Repository<'c>) -> Self {
        Self { repo }
    }

    /// ENF-01: no phase may be created while another is ACTIVE.
    pub fn single_active_phase(&self) -> Result<()> {
        match self.repo.find_active_phase()? {
            Some(active) => Err(WorkflowError::ActivePhaseExists {
                active_phase_id: active.id,
            }),
            None => Ok(()),
        }
    }

    /// ENF-02: a LOCKED decision cannot be updated, deleted or locked again.
    pub fn decision_mutable(&self, decision_id: &str) -> Result<Decision> {
        let decision = self.repo.find_decision(decision_id)?;
        if decision.is_locked() {
            return Err(WorkflowError::LockedDecisionImmutable {
                decision_id: decision.id,
            });
        }
        Ok(decision)
    }

    /// ENF-03: tasks only descend from LOCKED decisions.
    pub fn task_provenance(&self, decision_id: &str) -> Result<Decision> {
        let decision = self.repo.find_decision(decision_id)?;
        if !decision.is_locked() {
            return Err(WorkflowError::DecisionNotLocked {
                decision_id: decision.id,
                status: decision.status.as_str().to_string(),
            });
        }
        Ok(decision)
    }

    /// ENF-04: children are only created under an ACTIVE phase.
    pub fn phase_accepts_children(&self, phase_id: &str) -> Result<Phase> {
        self.phase_is_active(phase_id, ENF_04)
    }

    /// ENF-05: phase-scoped entities are only updated while their phase is ACTIVE.
    pub fn phase_allows_updates(&self, phase_id: &str) -> Result<Phase> {
        self.phase_is_active(phase_id, ENF_05)
    }

    /// ENF-06: a phase in a terminal status is frozen.
    pub fn phase_mutable(&self, phase_id: &str) -> Result<Phase> {
        let phase = self.repo.find_phase(phase_id)?;
        if phase.status.is_terminal() {
            return Err(WorkflowError::ClosedPhaseImmutable {
                phase_id: phase.id,
                status: phase.status.as_str().to_string(),
            });
        }
        Ok(phase)
    }

    fn phase_is_active(&self, phase_id: &str, rule: &'static str) -> Result<Phase> {
        let phase = self.repo.find_phase(phase_id)?;
        if phase.status != PhaseStatus::Active {
            return Err(WorkflowError::PhaseNotActive {
                rule,
                phase_id: phase.id,
                status: phase.status.as_str().to_string(),
            });
        }
        Ok(phase)
    }
}
