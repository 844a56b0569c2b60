use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("no MCP server configured with name {0}")]
    UnknownServer(String),

    #[error("server {server} does not support SSE transport")]
    NotSseTransport { server: String },

    #[error("transport error contacting MCP server {server}: {source}")]
    Transport {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("MCP server {server} returned JSON-RPC error {code}: {message}")]
    RpcError {
        server: String,
        code: i64,
        message: String,
    },

    #[error("malformed response from MCP server {server}: {0}")]
    MalformedResponse(String, #[source] serde_json::Error),

    #[error("SSE stream from MCP server {server} ended unexpectedly")]
    StreamClosed { server: String },
}

pub type Result<T> = std::result::Result<T, McpError>;
