//! Trait contracts for the gateway's external collaborators (§6).
//!
//! These are deliberately thin: the core never depends on a concrete Redis
//! client, Postgres pool or credit-ledger implementation, only on these
//! traits. Production adapters are wired in by the entry-layer binary.

pub mod cache;
pub mod collaborators;

pub use cache::DurableCache;
pub use collaborators::{CreditLedger, FileService, SystemPromptStore, ToolCatalog};
