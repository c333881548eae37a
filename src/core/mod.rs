//! Core modules for Archon's coordination kernel.
//!
//! This is the foundation of Archon's deterministic capability governance.
//! All core subsystems and shared primitives live here.
//!
//! ## Module Overview
//!
//! - **`taxonomy`**: the closed capability type/tier/hazard-matrix taxonomy
//! - **`dsl`**: the restriction DSL tokenizer, parser, and canonical compiler
//! - **`state_io`**: durable (file-backed) vs in-memory state abstraction
//! - **`registries`**: module/capability/restriction/ack/resource-config stores
//! - **`snapshot`**: canonical, hashable effective-policy assembly (`RS_hash`)
//! - **`validate`**: the pure `(action, snapshot) -> decision` evaluation engine
//! - **`adapters`**: adapter contracts and the handler dispatch registry
//! - **`gate`**: decision, durable logging, and dispatch sequencing
//! - **`governance`**: atomic enable-capability / disable-module commit logic
//! - **`proposal`**: pending/applied/rejected/failed proposal queue
//! - **`log_reader`**: JSONL log parsing, dedup, and drift detection
//! - **`secrets`**: AEAD-sealed secret envelope (device key or passphrase KDF)
//! - **`error`**: canonical error type for all Archon operations
//! - **`time`**: injectable clock/id-generator traits, real and fixed
//! - **`project_store`**: multi-project registry and `StateIO` resolution
//!
//! ## Agent Contract
//!
//! 1. Every capability action is gated: decide, log, then (only on permit) dispatch.
//! 2. Deny-by-default: nothing executes without an explicit enablement chain.
//! 3. Every decision pins the `RS_hash` in effect when it was made.

pub mod adapters;
pub mod dsl;
pub mod error;
pub mod gate;
pub mod governance;
pub mod log_reader;
pub mod project_store;
pub mod proposal;
pub mod registries;
pub mod secrets;
pub mod snapshot;
pub mod state_io;
pub mod taxonomy;
pub mod time;
pub mod validate;
