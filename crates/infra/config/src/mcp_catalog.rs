use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Transport declared for an MCP server entry. `Sse` servers support
/// `connect_sse`; both kinds support `call_tool`/`list_tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportKind {
    Http,
    Sse,
}

#[derive(Debug, Clone, Deserialize)]
struct RawServerConfig {
    url: String,
    #[serde(default)]
    transport: Option<McpTransportKind>,
    #[serde(default)]
    auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCatalog {
    servers: HashMap<String, RawServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub url: String,
    pub transport: McpTransportKind,
    pub auth_token: Option<String>,
}

/// The set of configured MCP servers, loaded once at startup from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct McpCatalog {
    servers: HashMap<String, McpServerConfig>,
}

impl McpCatalog {
    /// Parses a JSON catalog, expanding `${VAR}` placeholders in `url` and
    /// `auth_token` against the process environment. A missing `auth_token`
    /// after expansion falls back to the literal default string
    /// `"systemprompt-default-token"` rather than leaving the server
    /// unauthenticated outright, matching the default-string fallback
    /// described for missing tokens.
    pub fn load_from_str(raw_json: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(raw_json);
        let raw: RawCatalog = serde_json::from_str(&expanded)?;
        let servers = raw
            .servers
            .into_iter()
            .map(|(name, cfg)| {
                let auth_token = cfg.auth_token.filter(|t| !t.trim().is_empty());
                (
                    name.clone(),
                    McpServerConfig {
                        name,
                        url: cfg.url,
                        transport: cfg.transport.unwrap_or(McpTransportKind::Http),
                        auth_token,
                    },
                )
            })
            .collect();
        Ok(Self { servers })
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::load_from_str(&raw)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&McpServerConfig> {
        self.servers.get(name)
    }

    #[must_use]
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.keys().map(String::as_str).collect()
    }
}

const DEFAULT_TOKEN_FALLBACK: &str = "systemprompt-default-token";

impl McpServerConfig {
    #[must_use]
    pub fn effective_token(&self) -> &str {
        self.auth_token.as_deref().unwrap_or(DEFAULT_TOKEN_FALLBACK)
    }
}

fn expand_env_vars(raw: &str) -> String {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid");
    pattern
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_env_vars_in_url_and_token() {
        std::env::set_var("SP_TEST_MCP_HOST", "mcp.internal");
        let raw = r#"{"servers":{"weather":{"url":"https://${SP_TEST_MCP_HOST}/rpc","transport":"sse"}}}"#;
        let catalog = McpCatalog::load_from_str(raw).expect("parses");
        let server = catalog.get("weather").expect("server present");
        assert_eq!(server.url, "https://mcp.internal/rpc");
        assert_eq!(server.transport, McpTransportKind::Sse);
    }

    #[test]
    fn missing_token_falls_back_to_default_string() {
        let raw = r#"{"servers":{"weather":{"url":"https://weather.example/rpc"}}}"#;
        let catalog = McpCatalog::load_from_str(raw).expect("parses");
        let server = catalog.get("weather").expect("server present");
        assert_eq!(server.effective_token(), "systemprompt-default-token");
    }
}
