//! Group membership resolution.
//!
//! The router never looks up membership itself; the connection task resolves
//! the member set through a [`GroupResolver`] and passes it along.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Boxed future returned by resolver methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves a group id to the ids of its members.
pub trait GroupResolver: Send + Sync {
    /// Members of `group_id`. Unknown groups resolve to the empty set.
    fn members_of<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, HashSet<String>>;
}

/// In-memory group directory, seeded from config and updatable at runtime.
#[derive(Debug, Default)]
pub struct GroupDirectory {
    groups: RwLock<HashMap<String, HashSet<String>>>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from `group id -> member ids`.
    pub fn from_map(groups: &HashMap<String, Vec<String>>) -> Self {
        let groups = groups
            .iter()
            .map(|(id, members)| (id.clone(), members.iter().cloned().collect()))
            .collect();
        Self {
            groups: RwLock::new(groups),
        }
    }

    /// Replace the member set of `group_id`.
    pub fn set_members<I, S>(&self, group_id: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: HashSet<String> = members.into_iter().map(Into::into).collect();
        debug!(group_id = %group_id, members = members.len(), "group members updated");
        self.groups.write().insert(group_id.to_string(), members);
    }

    /// Forget `group_id`. Returns `true` if it existed.
    pub fn remove_group(&self, group_id: &str) -> bool {
        self.groups.write().remove(group_id).is_some()
    }

    /// Number of known groups.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl GroupResolver for GroupDirectory {
    fn members_of<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, HashSet<String>> {
        let members = self.groups.read().get(group_id).cloned().unwrap_or_default();
        Box::pin(async move { members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_configured_groups() {
        let mut config = HashMap::new();
        config.insert(
            "team".to_string(),
            vec!["alice".to_string(), "bob".to_string(), "alice".to_string()],
        );
        let directory = GroupDirectory::from_map(&config);

        let members = directory.members_of("team").await;
        assert_eq!(members.len(), 2);
        assert!(members.contains("alice") && members.contains("bob"));
        assert!(directory.members_of("nope").await.is_empty());
    }

    #[tokio::test]
    async fn runtime_updates() {
        let directory = GroupDirectory::new();
        assert!(directory.is_empty());

        directory.set_members("g1", ["carol", "dave"]);
        assert_eq!(directory.members_of("g1").await.len(), 2);

        directory.set_members("g1", ["carol"]);
        assert_eq!(directory.members_of("g1").await.len(), 1);

        assert!(directory.remove_group("g1"));
        assert!(!directory.remove_group("g1"));
        assert_eq!(directory.len(), 0);
    }
}
