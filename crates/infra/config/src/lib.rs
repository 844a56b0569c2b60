//! On-disk configuration for the gateway: the path cascade, the MCP server
//! catalog, and a file-backed system-prompt store.

pub mod mcp_catalog;
pub mod path;
pub mod prompt_store;

pub use mcp_catalog::{McpCatalog, McpServerConfig, McpTransportKind};
pub use path::PathResolver;
pub use prompt_store::FilePromptStore;
