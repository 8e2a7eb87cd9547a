//! CLI struct definitions for the phaselock command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "phaselock",
    version = env!("CARGO_PKG_VERSION"),
    about = "Invariant and integrity enforcement for an idea -> phase -> decision -> task -> document workflow."
)]
pub(crate) struct Cli {
    /// Directory holding phaselock.toml and, by default, the store.
    #[clap(long, global = true, default_value = ".")]
    pub dir: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the store and print the resolved configuration
    Init,
    /// Capture and promote ideas
    Idea(IdeaCli),
    /// Manage phases
    Phase(PhaseCli),
    /// Manage decisions
    Decision(DecisionCli),
    /// Manage tasks
    Task(TaskCli),
    /// Manage documents
    #[clap(name = "doc")]
    Document(DocumentCli),
    /// Query the audit trail
    Audit(AuditCli),
    /// Re-verify every content hash in the store
    Verify,
}

#[derive(clap::Args, Debug)]
pub(crate) struct IdeaCli {
    #[clap(subcommand)]
    pub command: IdeaCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum IdeaCommand {
    /// Park a new idea
    Add {
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        content: String,
    },
    /// Promote an idea into a new ACTIVE phase
    Promote {
        id: String,
        /// Phase name (defaults to the idea title)
        #[clap(long)]
        name: Option<String>,
    },
    Abandon {
        id: String,
    },
    Show {
        id: String,
    },
    List {
        /// PARKED, PROMOTED or ABANDONED
        #[clap(long)]
        status: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct PhaseCli {
    #[clap(subcommand)]
    pub command: PhaseCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum PhaseCommand {
    Create {
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    Update {
        id: String,
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    Abandon {
        id: String,
    },
    /// Without --token, issue a confirmation token. With it, close the phase.
    Close {
        id: String,
        #[clap(long)]
        token: Option<String>,
        /// Must be exactly CLOSE
        #[clap(long, default_value = "")]
        confirm: String,
    },
    /// Delete a phase and everything it owns
    Reset {
        id: String,
    },
    Show {
        id: String,
    },
    Active,
    List {
        /// ACTIVE, CLOSED or ABANDONED
        #[clap(long)]
        status: Option<String>,
    },
    /// Snapshots taken when the phase closed
    Snapshots {
        id: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct DecisionCli {
    #[clap(subcommand)]
    pub command: DecisionCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DecisionCommand {
    Add {
        #[clap(long)]
        phase: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        statement: String,
        #[clap(long, default_value = "")]
        rationale: String,
    },
    Update {
        id: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        statement: String,
        #[clap(long, default_value = "")]
        rationale: String,
    },
    Delete {
        id: String,
    },
    /// Without --token, issue a confirmation token. With it, lock the decision.
    Lock {
        id: String,
        #[clap(long)]
        token: Option<String>,
        /// Must be exactly LOCK
        #[clap(long, default_value = "")]
        confirm: String,
    },
    Show {
        id: String,
    },
    List {
        #[clap(long)]
        phase: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct TaskCli {
    #[clap(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TaskCommand {
    Add {
        #[clap(long)]
        decision: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    Update {
        id: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
    },
    Start {
        id: String,
    },
    Pause {
        id: String,
    },
    Complete {
        id: String,
    },
    Cancel {
        id: String,
    },
    Show {
        id: String,
    },
    List {
        #[clap(long)]
        decision: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct DocumentCli {
    #[clap(subcommand)]
    pub command: DocumentCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DocumentCommand {
    Add {
        #[clap(long)]
        phase: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        content: String,
    },
    Update {
        id: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        content: String,
    },
    Delete {
        id: String,
    },
    Show {
        id: String,
    },
    List {
        #[clap(long)]
        phase: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuditCli {
    #[clap(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AuditCommand {
    /// History of one entity, oldest first
    Entity {
        #[clap(long = "type")]
        entity_type: String,
        #[clap(long)]
        id: String,
    },
    /// Entries with one action, e.g. ENFORCEMENT_VIOLATION
    Action {
        action: String,
    },
    /// Newest entries first
    Recent {
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },
    /// Entries within [from, to] epoch milliseconds
    Range {
        #[clap(long)]
        from: i64,
        #[clap(long)]
        to: i64,
    },
}
