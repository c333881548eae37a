//! Adapter contracts (C7, spec §4.7): the trait boundary between the gate
//! and whatever actually performs a permitted action.
//!
//! No concrete adapter ships here — filesystem, network, exec, secrets,
//! messaging, and ui implementations are out of scope (spec §1). What does
//! ship is the contract shape and the dispatch registry, fully exercised in
//! tests against a trivial in-memory fake.

use crate::core::registries::ResourceConfig;
use crate::core::taxonomy::RiskTier;
use crate::core::validate::CapabilityInstance;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Context passed to every adapter call: everything it needs to honor
/// resource scoping without trusting caller-supplied values. An exec
/// adapter, for instance, must derive its cwd from `resource_config`, never
/// from anything on `capability_instance.params`.
#[derive(Debug, Clone)]
pub struct AdapterCallContext {
    pub agent_id: String,
    pub capability_instance: CapabilityInstance,
    pub rs_hash: String,
    pub resource_config: ResourceConfig,
}

/// The outcome of a dispatched adapter call, folded into the gate's
/// `DecisionLog.output_hash` once dispatch completes.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Success(Value),
    Failed(String),
}

#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

#[async_trait]
pub trait ExecAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

#[async_trait]
pub trait SecretsAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

#[async_trait]
pub trait MessagingAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

#[async_trait]
pub trait UiAdapter: Send + Sync {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult;
}

/// One boxed adapter per family, bundled so the gate can route by capability
/// family without matching on a string.
pub struct AdapterBundle {
    pub filesystem: Box<dyn FilesystemAdapter>,
    pub network: Box<dyn NetworkAdapter>,
    pub exec: Box<dyn ExecAdapter>,
    pub secrets: Box<dyn SecretsAdapter>,
    pub messaging: Box<dyn MessagingAdapter>,
    pub ui: Box<dyn UiAdapter>,
}

/// Which adapter family a `(module_id, capability_id)` pair routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterFamily {
    Filesystem,
    Network,
    Exec,
    Secrets,
    Messaging,
    Ui,
}

/// Maps `(module_id, capability_id)` to the adapter family that should
/// handle it. A missing pair is a policy-level deny (`handler_not_registered`),
/// never a panic — spec §9's "typed registry keyed by a pair" redesign.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), AdapterFamily>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module_id: impl Into<String>, capability_id: impl Into<String>, family: AdapterFamily) {
        self.handlers.insert((module_id.into(), capability_id.into()), family);
    }

    pub fn lookup(&self, module_id: &str, capability_id: &str) -> Option<AdapterFamily> {
        self.handlers
            .get(&(module_id.to_string(), capability_id.to_string()))
            .copied()
    }

    /// Dispatch through the registered family's adapter, or a terminal
    /// `failed` result if the pair is unregistered.
    pub async fn dispatch(
        &self,
        ctx: &AdapterCallContext,
        adapters: &AdapterBundle,
    ) -> DispatchResult {
        let module_id = ctx.capability_instance.module_id.clone();
        let capability_id = ctx.capability_instance.capability_id.clone();
        match self.lookup(&module_id, &capability_id) {
            Some(AdapterFamily::Filesystem) => adapters.filesystem.call(ctx).await,
            Some(AdapterFamily::Network) => adapters.network.call(ctx).await,
            Some(AdapterFamily::Exec) => adapters.exec.call(ctx).await,
            Some(AdapterFamily::Secrets) => adapters.secrets.call(ctx).await,
            Some(AdapterFamily::Messaging) => adapters.messaging.call(ctx).await,
            Some(AdapterFamily::Ui) => adapters.ui.call(ctx).await,
            None => DispatchResult::Failed("handler_not_registered".to_string()),
        }
    }
}

/// A deterministic typed-ack phrase expectation, re-exported here for
/// adapters that surface it to an operator prompt (e.g. a `ui` adapter
/// relaying an unconfirmed T3 request). Thin re-export, not new logic.
pub fn describe_tier(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::T0 => "no acknowledgment required",
        RiskTier::T1 => "low risk",
        RiskTier::T2 => "elevated risk",
        RiskTier::T3 => "requires typed acknowledgment",
    }
}
