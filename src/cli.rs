//! Command-line surface: clap derive structs only. Dispatch logic lives in
//! `lib.rs::run`, which matches on these types and calls into `core::*`.
//!
//! The command set is fixed: `status`, `enable`, `disable`, `restrict`,
//! `rules`, `log`, `demo`, `propose`, `proposals`, `project`. Every
//! subcommand that prints machine-readable data accepts `--json`.

use clap::{Args, Parser, Subcommand};

/// Archon: a deterministic coordination kernel for AI-agent capability
/// governance.
#[derive(Debug, Clone, Parser)]
#[command(name = "archon", version, about, long_about = None)]
pub struct Cli {
    /// Project id to operate against. Defaults to the currently open project.
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the current project's enabled modules, capabilities, and ack epoch.
    Status,

    /// Enable a module or capability.
    Enable {
        #[command(subcommand)]
        target: EnableTarget,
    },

    /// Disable a module or capability.
    Disable {
        #[command(subcommand)]
        target: DisableTarget,
    },

    /// Manage structured restriction rules (the DRR allow/deny list).
    Restrict {
        #[command(subcommand)]
        action: RestrictAction,
    },

    /// List the compiled restriction rules in effect for the current snapshot.
    Rules,

    /// Read the decision/proposal-event log and report drift status.
    Log(LogArgs),

    /// Run a capability through the gate against a trivial demo adapter bundle.
    Demo {
        /// Wire-form capability type, e.g. `fs.read`.
        #[arg(value_name = "TYPE")]
        capability_type: String,
        /// Path or URL parameter handed to the demo action.
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Submit a governance change for later approval.
    Propose {
        #[command(subcommand)]
        action: ProposeAction,
    },

    /// Inspect and act on the proposal queue.
    Proposals {
        #[command(subcommand)]
        action: ProposalsAction,
    },

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum EnableTarget {
    /// Enable a registered module.
    Module {
        module_id: String,
        /// Required for mutators that need explicit operator assent.
        #[arg(long)]
        confirm: bool,
    },
    /// Enable a capability type declared by an already-enabled module.
    Capability {
        /// Wire-form capability type, e.g. `fs.delete`.
        capability_type: String,
        /// The byte-exact T3 typed-ack phrase, when required.
        #[arg(long)]
        ack_phrase: Option<String>,
        /// A hazard-pair partner type this invocation confirms alongside `capability_type`.
        #[arg(long = "confirm-hazard-with")]
        confirm_hazard_with: Vec<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum DisableTarget {
    /// Disable a module, cascading to any capability only it declares.
    Module {
        module_id: String,
        #[arg(long)]
        confirm: bool,
    },
    /// Disable a capability type directly.
    Capability { capability_type: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum RestrictAction {
    /// Add one structured allow/deny rule.
    Add {
        /// `allow` or `deny`.
        effect: String,
        /// Wire-form capability type.
        capability_type: String,
        /// Zero or more `field=glob` conditions, e.g. `path=./docs/**`.
        #[arg(value_name = "FIELD=GLOB")]
        conditions: Vec<String>,
    },
    /// Add one rule from DSL source text.
    AddDsl {
        /// `allow fs.read where capability.params.path matches "./docs/**"`.
        source: String,
    },
    /// List every stored restriction rule with its assigned `drr:N` id.
    List,
    /// Remove every stored restriction rule. The id counter never resets.
    Clear,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Which log to read: `decisions` or `proposals`.
    #[arg(long, default_value = "decisions")]
    pub source: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProposeAction {
    /// Propose enabling a capability.
    Enable { capability_type: String },
    /// Propose disabling a capability.
    Disable { capability_type: String },
    /// Propose replacing the restriction rule set wholesale, from DSL source
    /// lines (one rule per `--rule`).
    SetRestrictions {
        #[arg(long = "rule")]
        rules: Vec<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProposalsAction {
    /// List proposals, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one proposal in full.
    Show { id: String },
    /// Approve a pending proposal, committing its change.
    Approve {
        id: String,
        #[arg(long)]
        ack_phrase: Option<String>,
        #[arg(long = "confirm-hazard-with")]
        confirm_hazard_with: Vec<String>,
        #[arg(long)]
        secret_value: Option<String>,
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Reject a pending proposal.
    Reject {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProjectAction {
    /// Register a new project id.
    Create { id: String },
    /// List every registered project.
    List,
    /// Switch the active project.
    Open { id: String },
    /// Print the currently active project id.
    Current,
}
