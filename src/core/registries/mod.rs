//! The five stateful registries (C4, spec §4.4): module, capability,
//! restriction, ack, and resource-config stores. Each is scoped to a single
//! `StateIO` handle and owned exclusively by the runtime that constructed
//! it — registries are rebuilt from disk, never shared across threads.

pub mod acks;
pub mod capabilities;
pub mod modules;
pub mod resource_config;
pub mod restrictions;

pub use acks::AckStore;
pub use capabilities::CapabilityRegistry;
pub use modules::{CapabilityDescriptor, ModuleManifest, ModuleRegistry};
pub use resource_config::{FsRoot, Perm, ResourceConfig, ResourceConfigStore};
pub use restrictions::{RestrictionRegistry, StoredRestriction};

/// A non-constructible authorization token proving the prompt/CLI layer
/// gathered explicit human confirmation before an operator-assent mutator
/// (`enable`, `disable`, ...) runs. Spec §9 models the source's
/// `{confirmed: true}` marker this way: the private field makes `Confirmed`
/// impossible to build except through [`Confirmed::attest`].
#[derive(Debug, Clone, Copy)]
pub struct Confirmed(());

impl Confirmed {
    /// Mint a confirmation token. Call only from the layer that actually
    /// gathered operator assent (a CLI prompt, an approved proposal) —
    /// never speculatively.
    pub fn attest() -> Self {
        Confirmed(())
    }
}
