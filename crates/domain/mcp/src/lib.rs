mod client;
mod error;
mod manager;
mod wire;

pub use client::{McpClient, SseEvent};
pub use error::{McpError, Result};
pub use manager::McpManager;
pub use wire::McpToolDescriptor;

#[cfg(test)]
mod tests {
    use super::*;
    use systemprompt_config::McpCatalog;

    #[tokio::test]
    async fn unknown_server_is_rejected() {
        let catalog = McpCatalog::load_from_str(r#"{"servers":{}}"#).expect("parses");
        let manager = McpManager::new(catalog);
        let err = manager.client("ghost").await.expect_err("must fail");
        assert!(matches!(err, McpError::UnknownServer(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn client_is_memoized_across_lookups() {
        let catalog = McpCatalog::load_from_str(
            r#"{"servers":{"weather":{"url":"https://weather.example/rpc"}}}"#,
        )
        .expect("parses");
        let manager = McpManager::new(catalog);
        let first = manager.client("weather").await.expect("creates client");
        let second = manager.client("weather").await.expect("reuses client");
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }
}
