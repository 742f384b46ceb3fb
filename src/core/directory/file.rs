use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{AgentProfile, Directory, DirectoryError, DirectoryResult, collection_name};
use crate::core::credentials::ProviderId;

/// Directory loaded once from a YAML document.
///
/// # Example
/// ```yaml
/// organizations:
///   - id: org-1
///     name: Acme
///     users: [user-1]
///     provider_keys:
///       - provider: openai
///         key: sk-...
///       - provider: deepgram
///         key: dg-...
///         active: false
///     agents:
///       - id: agent-1
///         name: Front Desk
///         system_prompt: You answer questions about Acme.
///         knowledge_bases: ["7"]
/// ```
#[derive(Debug, Default)]
pub struct FileDirectory {
    user_orgs: HashMap<String, String>,
    agents: HashMap<(String, String), AgentProfile>,
    keys: HashMap<(String, ProviderId), String>,
    collections: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryDocument {
    #[serde(default)]
    organizations: Vec<OrganizationEntry>,
}

#[derive(Debug, Deserialize)]
struct OrganizationEntry {
    id: String,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    provider_keys: Vec<ProviderKeyEntry>,
    #[serde(default)]
    agents: Vec<AgentEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderKeyEntry {
    provider: ProviderId,
    key: String,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    #[serde(flatten)]
    profile: AgentProfile,
    #[serde(default)]
    knowledge_bases: Vec<String>,
}

impl FileDirectory {
    pub fn from_file(path: &Path) -> DirectoryResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DirectoryError::Unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let directory = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            users = directory.user_orgs.len(),
            agents = directory.agents.len(),
            "Loaded directory"
        );
        Ok(directory)
    }

    pub fn from_yaml_str(contents: &str) -> DirectoryResult<Self> {
        let document: DirectoryDocument = serde_yaml::from_str(contents)
            .map_err(|e| DirectoryError::Invalid(format!("Failed to parse directory: {e}")))?;

        let mut directory = Self::default();
        for org in document.organizations {
            for user in org.users {
                if let Some(existing) = directory.user_orgs.insert(user.clone(), org.id.clone())
                    && existing != org.id
                {
                    return Err(DirectoryError::Invalid(format!(
                        "User {user} belongs to both {existing} and {}",
                        org.id
                    )));
                }
            }

            for entry in org.provider_keys {
                if entry.active && !entry.key.trim().is_empty() {
                    directory
                        .keys
                        .insert((org.id.clone(), entry.provider), entry.key);
                }
            }

            for agent in org.agents {
                if let Some(kb) = agent.knowledge_bases.first() {
                    directory
                        .collections
                        .insert(agent.profile.id.clone(), collection_name(kb));
                }
                let key = (org.id.clone(), agent.profile.id.clone());
                if directory.agents.insert(key, agent.profile).is_some() {
                    return Err(DirectoryError::Invalid(format!(
                        "Duplicate agent id in organization {}",
                        org.id
                    )));
                }
            }
        }

        Ok(directory)
    }
}

#[async_trait]
impl Directory for FileDirectory {
    async fn organization_for_user(&self, user_id: &str) -> DirectoryResult<Option<String>> {
        Ok(self.user_orgs.get(user_id).cloned())
    }

    async fn agent(&self, org_id: &str, agent_id: &str) -> DirectoryResult<Option<AgentProfile>> {
        Ok(self
            .agents
            .get(&(org_id.to_string(), agent_id.to_string()))
            .cloned())
    }

    async fn provider_key(
        &self,
        org_id: &str,
        provider: ProviderId,
    ) -> DirectoryResult<Option<String>> {
        Ok(self.keys.get(&(org_id.to_string(), provider)).cloned())
    }

    async fn knowledge_collection(&self, agent_id: &str) -> DirectoryResult<Option<String>> {
        Ok(self.collections.get(agent_id).cloned())
    }
}
