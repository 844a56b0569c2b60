use std::collections::HashMap;

use async_trait::async_trait;
use systemprompt_identifiers::RoleName;
use systemprompt_traits::SystemPromptStore;

/// A `SystemPromptStore` backed by a flat YAML mapping of role name to prompt
/// text, loaded once at startup. Used when no database-backed translations
/// table is wired in; the database-backed equivalent is a drop-in replacement
/// implementing the same trait.
#[derive(Debug, Clone, Default)]
pub struct FilePromptStore {
    prompts: HashMap<String, String>,
}

impl FilePromptStore {
    pub fn load_from_str(raw_yaml: &str) -> anyhow::Result<Self> {
        let prompts: HashMap<String, String> = serde_yaml::from_str(raw_yaml)?;
        Ok(Self { prompts })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SystemPromptStore for FilePromptStore {
    async fn get(&self, role_name: &RoleName) -> anyhow::Result<Option<String>> {
        Ok(self.prompts.get(role_name.as_str()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_role_falls_back_to_none() {
        let store = FilePromptStore::load_from_str("general_assistant: \"You are helpful.\"\n")
            .expect("parses");
        assert_eq!(
            store.get(&RoleName::new("general_assistant")).await.unwrap(),
            Some("You are helpful.".to_string())
        );
        assert_eq!(store.get(&RoleName::new("unknown_role")).await.unwrap(), None);
    }
}
