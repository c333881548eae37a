//! Closed capability taxonomy: types, risk tiers, typed-ack phrases, and the
//! hazard matrix (C1).
//!
//! The taxonomy is closed and versioned alongside [`ENGINE_VERSION`]: no
//! plugin or registry can introduce a new `CapabilityType` at runtime.
//! Unknown types are rejected at every boundary — snapshot construction,
//! validation, and enablement all go through [`CapabilityType::parse`] or
//! serde, never a raw string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the taxonomy + hazard matrix. Bumping this changes every
/// `RS_hash` (spec I4), since `config_hash` folds it in.
pub const ENGINE_VERSION: &str = "archon-1.0.0";

/// The closed, versioned set of capability type identifiers.
///
/// Nineteen variants, one risk tier each (see [`CapabilityType::tier`]).
/// Wire form is the dotted string (`fs.read`), never the Rust identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapabilityType {
    #[serde(rename = "ui.prompt")]
    UiPrompt,
    #[serde(rename = "ui.notify")]
    UiNotify,
    #[serde(rename = "fs.read")]
    FsRead,
    #[serde(rename = "fs.watch")]
    FsWatch,
    #[serde(rename = "fs.write")]
    FsWrite,
    #[serde(rename = "fs.move")]
    FsMove,
    #[serde(rename = "fs.delete")]
    FsDelete,
    #[serde(rename = "net.fetch.http")]
    NetFetchHttp,
    #[serde(rename = "net.post.http")]
    NetPostHttp,
    #[serde(rename = "net.fetch.raw_socket")]
    NetFetchRawSocket,
    #[serde(rename = "net.listen")]
    NetListen,
    #[serde(rename = "exec.run_sandboxed")]
    ExecRunSandboxed,
    #[serde(rename = "exec.run")]
    ExecRun,
    #[serde(rename = "exec.run_privileged")]
    ExecRunPrivileged,
    #[serde(rename = "secrets.use")]
    SecretsUse,
    #[serde(rename = "secrets.write")]
    SecretsWrite,
    #[serde(rename = "secrets.rotate")]
    SecretsRotate,
    #[serde(rename = "messaging.send")]
    MessagingSend,
    #[serde(rename = "messaging.receive")]
    MessagingReceive,
}

/// All nineteen capability types, in declaration order. Used for taxonomy
/// closure checks and for the `--json` capability listing in the CLI.
pub const ALL_CAPABILITY_TYPES: [CapabilityType; 19] = [
    CapabilityType::UiPrompt,
    CapabilityType::UiNotify,
    CapabilityType::FsRead,
    CapabilityType::FsWatch,
    CapabilityType::FsWrite,
    CapabilityType::FsMove,
    CapabilityType::FsDelete,
    CapabilityType::NetFetchHttp,
    CapabilityType::NetPostHttp,
    CapabilityType::NetFetchRawSocket,
    CapabilityType::NetListen,
    CapabilityType::ExecRunSandboxed,
    CapabilityType::ExecRun,
    CapabilityType::ExecRunPrivileged,
    CapabilityType::SecretsUse,
    CapabilityType::SecretsWrite,
    CapabilityType::SecretsRotate,
    CapabilityType::MessagingSend,
    CapabilityType::MessagingReceive,
];

impl CapabilityType {
    /// Wire-form dotted identifier, e.g. `"fs.read"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UiPrompt => "ui.prompt",
            Self::UiNotify => "ui.notify",
            Self::FsRead => "fs.read",
            Self::FsWatch => "fs.watch",
            Self::FsWrite => "fs.write",
            Self::FsMove => "fs.move",
            Self::FsDelete => "fs.delete",
            Self::NetFetchHttp => "net.fetch.http",
            Self::NetPostHttp => "net.post.http",
            Self::NetFetchRawSocket => "net.fetch.raw_socket",
            Self::NetListen => "net.listen",
            Self::ExecRunSandboxed => "exec.run_sandboxed",
            Self::ExecRun => "exec.run",
            Self::ExecRunPrivileged => "exec.run_privileged",
            Self::SecretsUse => "secrets.use",
            Self::SecretsWrite => "secrets.write",
            Self::SecretsRotate => "secrets.rotate",
            Self::MessagingSend => "messaging.send",
            Self::MessagingReceive => "messaging.receive",
        }
    }

    /// Parse a wire-form dotted identifier. Returns `None` for anything
    /// outside the closed taxonomy — callers at every boundary (DSL, CLI,
    /// snapshot construction) must reject `None` rather than guess.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_CAPABILITY_TYPES.into_iter().find(|t| t.as_str() == s)
    }

    /// True if this type's family is `fs.*`.
    pub fn is_fs(&self) -> bool {
        self.as_str().starts_with("fs.")
    }

    /// True if this type's family is `net.*`.
    pub fn is_net(&self) -> bool {
        self.as_str().starts_with("net.")
    }

    /// True if this type's family is `exec.*`.
    pub fn is_exec(&self) -> bool {
        self.as_str().starts_with("exec.")
    }

    /// The statically assigned risk tier for this type.
    pub fn tier(&self) -> RiskTier {
        match self {
            Self::UiPrompt | Self::UiNotify => RiskTier::T0,
            Self::FsRead | Self::NetFetchHttp | Self::MessagingSend | Self::MessagingReceive => {
                RiskTier::T1
            }
            Self::FsWrite
            | Self::NetPostHttp
            | Self::ExecRunSandboxed
            | Self::SecretsUse
            | Self::FsWatch => RiskTier::T2,
            Self::FsDelete
            | Self::ExecRun
            | Self::NetListen
            | Self::SecretsWrite
            | Self::SecretsRotate
            | Self::FsMove
            | Self::ExecRunPrivileged
            | Self::NetFetchRawSocket => RiskTier::T3,
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk tier, `T0` (lowest) through `T3` (requires a typed acknowledgment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    T0,
    T1,
    T2,
    T3,
}

impl RiskTier {
    /// Wire-form identifier, e.g. `"T3"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T0 => "T0",
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// True iff the tier requires a typed acknowledgment phrase at enable time.
pub fn typed_ack_required(tier: RiskTier) -> bool {
    tier == RiskTier::T3
}

/// Builds the byte-exact phrase an operator must supply to enable a T3
/// capability. No trimming, no case folding is applied anywhere this is
/// compared — see [`crate::core::governance::apply_enable_capability`].
pub fn build_expected_ack_phrase(tier: RiskTier, ty: CapabilityType) -> String {
    format!("I ACCEPT {} RISK ({})", tier, ty)
}

/// An unordered pair of capability types that, co-enabled, unlock a
/// dangerous composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardPair {
    pub a: CapabilityType,
    pub b: CapabilityType,
    pub description: &'static str,
}

impl HazardPair {
    /// Order-insensitive containment check for a concrete `(x, y)` pair.
    pub fn matches(&self, x: CapabilityType, y: CapabilityType) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// The "other half" of this pair given one side, if `ty` is in it.
    pub fn partner_of(&self, ty: CapabilityType) -> Option<CapabilityType> {
        if self.a == ty {
            Some(self.b)
        } else if self.b == ty {
            Some(self.a)
        } else {
            None
        }
    }
}

/// The declared hazard matrix: capability pairs whose simultaneous
/// enablement requires an explicit confirmation beyond the individual
/// typed ack (spec I3).
pub fn hazard_matrix() -> Vec<HazardPair> {
    vec![
        HazardPair {
            a: CapabilityType::ExecRun,
            b: CapabilityType::NetFetchRawSocket,
            description: "arbitrary exec plus raw network access enables unmonitored exfiltration",
        },
        HazardPair {
            a: CapabilityType::SecretsUse,
            b: CapabilityType::NetPostHttp,
            description: "secret material plus outbound posting enables credential exfiltration",
        },
        HazardPair {
            a: CapabilityType::SecretsUse,
            b: CapabilityType::ExecRun,
            description: "secret material plus arbitrary exec enables credential misuse",
        },
        HazardPair {
            a: CapabilityType::FsDelete,
            b: CapabilityType::ExecRunPrivileged,
            description: "destructive fs access plus privileged exec enables unrecoverable damage",
        },
        HazardPair {
            a: CapabilityType::SecretsWrite,
            b: CapabilityType::NetListen,
            description: "secret mutation plus an open listener enables remote credential takeover",
        },
    ]
}

/// Every hazard pair whose partner (relative to `ty`) is already a member
/// of `already_enabled`.
pub fn triggered_hazard_pairs(
    ty: CapabilityType,
    already_enabled: &[CapabilityType],
) -> Vec<HazardPair> {
    hazard_matrix()
        .into_iter()
        .filter(|pair| {
            pair.partner_of(ty)
                .is_some_and(|partner| already_enabled.contains(&partner))
        })
        .collect()
}
