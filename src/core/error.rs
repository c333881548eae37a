//! Error types for Archon operations.
//!
//! This module defines the canonical error type used throughout Archon.
//! All subsystems return `Result<T, ArchonError>` for error handling.
//!
//! The validation engine itself never returns `Err` for a policy outcome —
//! every policy decision is a value (`Permit`/`Deny`/`Escalate`). `ArchonError`
//! is reserved for infrastructure faults: I/O, malformed persisted state,
//! serialization, and the kind-tagged governance errors from the spec.

use std::env;
use std::io;
use thiserror::Error;

/// Canonical error type for all Archon operations.
#[derive(Error, Debug)]
pub enum ArchonError {
    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment variable error (auto-converts from `std::env::VarError`)
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] env::VarError),

    /// A value outside the closed capability taxonomy appeared at a boundary.
    #[error("Unknown capability type: {0}")]
    TaxonomyUnknown(String),

    /// A taxonomy rule was violated (e.g. duplicate module id, unknown tier).
    #[error("Taxonomy violation: {0}")]
    TaxonomyViolation(String),

    /// A capability is not enabled in the current snapshot/registry.
    #[error("Capability not enabled: {0}")]
    CapabilityNotEnabled(String),

    /// A module id was never registered.
    #[error("Module not registered: {0}")]
    ModuleNotRegistered(String),

    /// A module is registered but not enabled.
    #[error("Module not enabled: {0}")]
    ModuleNotEnabled(String),

    /// Action project id did not match snapshot project id.
    #[error("Project mismatch: {0}")]
    ProjectMismatch(String),

    /// Action was restricted by an explicit deny rule.
    #[error("Restricted by rule: {0}")]
    RestrictedByRule(String),

    /// An allowlist existed for this type but nothing matched.
    #[error("Allowlist exhausted for: {0}")]
    AllowlistExhausted(String),

    /// A resource-scoping check failed (fs root, net allowlist, exec cwd).
    #[error("Resource config violation: {0}")]
    ResourceConfigViolation(String),

    /// A T3 capability requires a typed acknowledgment that was not supplied.
    #[error("Acknowledgment required: {0}")]
    AckRequired(String),

    /// The typed acknowledgment phrase did not match byte-exactly.
    #[error("Acknowledgment phrase mismatch: expected {expected:?}")]
    AckPhraseMismatch {
        /// The byte-exact phrase that was required.
        expected: String,
    },

    /// A hazard pair was triggered but not confirmed.
    #[error("Hazard unconfirmed: {0}")]
    HazardUnconfirmed(String),

    /// A proposal operation was attempted on a proposal not in `pending`.
    #[error("Proposal not pending: {0}")]
    ProposalNotPending(String),

    /// The acting principal lacked the authority for this operation.
    #[error("Authority insufficient: {0}")]
    AuthorityInsufficient(String),

    /// A `set_secret` proposal was approved without a value.
    #[error("Secret value required for: {0}")]
    SecretValueRequired(String),

    /// A durable write failed irrecoverably.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A requested resource (project, proposal, ack event) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cryptographic operation failed (encryption, decryption, KDF).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// A DSL source string failed to parse.
    #[error("DSL parse error at {line}:{column}: {message}")]
    DslParse {
        /// 1-based line of the failure.
        line: usize,
        /// 1-based column of the failure.
        column: usize,
        /// Human-readable description.
        message: String,
    },
}
