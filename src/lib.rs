//! Phaselock: invariant and integrity enforcement for a planning workflow.
//!
//! Work moves through **idea -> phase -> decision -> task -> document**. Phaselock
//! sits between every caller and the SQLite store and refuses any mutation that
//! would break a workflow rule.
//!
//! # Guarantees
//!
//! - **Single focus**: at most one ACTIVE phase, checked by the enforcer and backed by
//!   a partial unique index.
//! - **Locked means locked**: tasks only descend from LOCKED decisions, and a LOCKED
//!   decision never changes again.
//! - **Tamper evidence**: every content row carries a `v1:` SHA-256 hash over its
//!   fields and its parent id, re-verified on every read.
//! - **Deliberate destruction**: closing a phase, locking a decision and restoring the
//!   store take a single-use token plus a literal confirmation word.
//! - **Append-only history**: every mutation and every rejected attempt lands in the
//!   audit log, which the store refuses to update or delete.
//!
//! # Example
//!
//! ```bash
//! phaselock idea add --title "Offline sync"
//! phaselock idea promote ID_...
//! phaselock decision add --phase PH_... --title "Use CRDTs"
//! phaselock decision lock DC_...                       # prints a token
//! phaselock decision lock DC_... --token CT_... --confirm LOCK
//! phaselock task add --decision DC_... --title "Prototype merge"
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: errors, hashing, ids, config and the store
//! - [`workflow`]: entities, repository, invariants, confirmation gate, audit log and
//!   the [`workflow::enforcer::Enforcer`] that ties them together

pub mod core;
pub mod workflow;

mod cli;

use crate::cli::{
    AuditCommand, Cli, Command, DecisionCommand, DocumentCommand, IdeaCommand, PhaseCommand,
    TaskCommand,
};
use crate::core::config::Config;
use crate::core::error::{self, WorkflowError};
use crate::core::store::Store;
use crate::workflow::audit::AuditAction;
use crate::workflow::decision::DecisionDraft;
use crate::workflow::enforcer::Enforcer;
use crate::workflow::status::{IdeaStatus, Lifecycle, PhaseStatus};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn emit<T: Serialize>(value: &T) -> Result<(), WorkflowError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{}", rendered);
    Ok(())
}

/// Parse arguments, load configuration from `--dir`, dispatch. Output is JSON.
pub fn run() -> Result<(), WorkflowError> {
    let cli = Cli::parse();
    let config = Config::load(&cli.dir)?;
    init_logging(&config.log.level);
    run_with_config(cli.command, &config)
}

/// `PHASELOCK_LOG` wins over `[log] level`. Logs go to stderr so stdout stays JSON.
fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PHASELOCK_LOG")
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_with_config(command: Command, config: &Config) -> Result<(), WorkflowError> {
    let store = Store::open(&config.store.path, config.store.busy_timeout_secs)?;
    let enforcer = Enforcer::new(&store, config);

    match command {
        Command::Init => emit(&serde_json::json!({
            "store": config.store.path.display().to_string(),
            "schema_version": crate::core::db::schema_version(store.conn())?,
            "config": config,
        })),
        Command::Idea(idea) => run_idea(&enforcer, idea.command),
        Command::Phase(phase) => run_phase(&enforcer, phase.command),
        Command::Decision(decision) => run_decision(&enforcer, decision.command),
        Command::Task(task) => run_task(&enforcer, task.command),
        Command::Document(doc) => run_document(&enforcer, doc.command),
        Command::Audit(audit) => run_audit(&enforcer, audit.command),
        Command::Verify => {
            let verified = enforcer.verify_all()?;
            emit(&serde_json::json!({ "status": "ok", "rows_verified": verified }))
        }
    }
}

fn run_idea(enforcer: &Enforcer<'_>, command: IdeaCommand) -> error::Result<()> {
    match command {
        IdeaCommand::Add { title, content } => emit(&enforcer.create_idea(&title, &content)?),
        IdeaCommand::Promote { id, name } => {
            let (idea, phase) = enforcer.promote_idea(&id, name.as_deref())?;
            emit(&serde_json::json!({ "idea": idea, "phase": phase }))
        }
        IdeaCommand::Abandon { id } => emit(&enforcer.abandon_idea(&id)?),
        IdeaCommand::Show { id } => emit(&enforcer.get_idea(&id)?),
        IdeaCommand::List { status } => {
            let status = status.as_deref().map(IdeaStatus::parse).transpose()?;
            emit(&enforcer.list_ideas(status)?)
        }
    }
}

fn run_phase(enforcer: &Enforcer<'_>, command: PhaseCommand) -> error::Result<()> {
    match command {
        PhaseCommand::Create { name, description } => {
            emit(&enforcer.create_phase(&name, &description)?)
        }
        PhaseCommand::Update {
            id,
            name,
            description,
        } => emit(&enforcer.update_phase(&id, &name, &description)?),
        PhaseCommand::Abandon { id } => emit(&enforcer.abandon_phase(&id)?),
        PhaseCommand::Close { id, token, confirm } => match token {
            None => emit(&enforcer.request_close_phase(&id)?),
            Some(token) => emit(&enforcer.confirm_close_phase(&id, &token, &confirm)?),
        },
        PhaseCommand::Reset { id } => {
            enforcer.reset_phase(&id)?;
            emit(&serde_json::json!({ "status": "reset", "phase_id": id }))
        }
        PhaseCommand::Show { id } => emit(&enforcer.get_phase(&id)?),
        PhaseCommand::Active => emit(&enforcer.active_phase()?),
        PhaseCommand::List { status } => {
            let status = status.as_deref().map(PhaseStatus::parse).transpose()?;
            emit(&enforcer.list_phases(status)?)
        }
        PhaseCommand::Snapshots { id } => emit(&enforcer.list_snapshots(&id)?),
    }
}

fn run_decision(enforcer: &Enforcer<'_>, command: DecisionCommand) -> error::Result<()> {
    match command {
        DecisionCommand::Add {
            phase,
            title,
            statement,
            rationale,
        } => {
            let draft = DecisionDraft {
                title,
                statement,
                rationale,
            };
            emit(&enforcer.create_decision(&phase, &draft)?)
        }
        DecisionCommand::Update {
            id,
            title,
            statement,
            rationale,
        } => {
            let draft = DecisionDraft {
                title,
                statement,
                rationale,
            };
            emit(&enforcer.update_decision(&id, &draft)?)
        }
        DecisionCommand::Delete { id } => {
            enforcer.delete_decision(&id)?;
            emit(&serde_json::json!({ "status": "deleted", "decision_id": id }))
        }
        DecisionCommand::Lock { id, token, confirm } => match token {
            None => emit(&enforcer.request_lock_decision(&id)?),
            Some(token) => emit(&enforcer.confirm_lock_decision(&id, &token, &confirm)?),
        },
        DecisionCommand::Show { id } => emit(&enforcer.get_decision(&id)?),
        DecisionCommand::List { phase } => emit(&enforcer.list_decisions(&phase)?),
    }
}

fn run_task(enforcer: &Enforcer<'_>, command: TaskCommand) -> error::Result<()> {
    match command {
        TaskCommand::Add {
            decision,
            title,
            description,
        } => emit(&enforcer.create_task(&decision, &title, &description)?),
        TaskCommand::Update {
            id,
            title,
            description,
        } => emit(&enforcer.update_task(&id, &title, &description)?),
        TaskCommand::Start { id } => emit(&enforcer.start_task(&id)?),
        TaskCommand::Pause { id } => emit(&enforcer.pause_task(&id)?),
        TaskCommand::Complete { id } => emit(&enforcer.complete_task(&id)?),
        TaskCommand::Cancel { id } => emit(&enforcer.cancel_task(&id)?),
        TaskCommand::Show { id } => emit(&enforcer.get_task(&id)?),
        TaskCommand::List { decision } => emit(&enforcer.list_tasks(&decision)?),
    }
}

fn run_document(enforcer: &Enforcer<'_>, command: DocumentCommand) -> error::Result<()> {
    match command {
        DocumentCommand::Add {
            phase,
            title,
            content,
        } => emit(&enforcer.create_document(&phase, &title, &content)?),
        DocumentCommand::Update { id, title, content } => {
            emit(&enforcer.update_document(&id, &title, &content)?)
        }
        DocumentCommand::Delete { id } => {
            enforcer.delete_document(&id)?;
            emit(&serde_json::json!({ "status": "deleted", "document_id": id }))
        }
        DocumentCommand::Show { id } => emit(&enforcer.get_document(&id)?),
        DocumentCommand::List { phase } => emit(&enforcer.list_documents(&phase)?),
    }
}

fn run_audit(enforcer: &Enforcer<'_>, command: AuditCommand) -> error::Result<()> {
    let audit = enforcer.audit();
    match command {
        AuditCommand::Entity { entity_type, id } => emit(&audit.for_entity(&entity_type, &id)?),
        AuditCommand::Action { action } => emit(&audit.by_action(AuditAction::parse(&action)?)?),
        AuditCommand::Recent { limit } => emit(&audit.recent(limit)?),
        AuditCommand::Range { from, to } => emit(&audit.in_range(from, to)?),
    }
}
