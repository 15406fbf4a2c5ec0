use std::collections::HashSet;

use crate::error::AppError;
use crate::services::Store;

/// Identifiers a viewer must never be shown
///
/// Always computed fresh from the store: the viewer, everyone the viewer has liked or passed,
/// and everyone the viewer has blocked. Signals received from others do not exclude.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    ids: HashSet<String>,
}

impl ExclusionSet {
    /// Compute the exclusion set for `viewer_id`
    ///
    /// A store failure is returned as-is; there is no fallback to an empty set.
    pub async fn compute(store: &dyn Store, viewer_id: &str) -> Result<Self, AppError> {
        let signalled = store.outgoing_signal_targets(viewer_id).await?;
        let blocked = store.blocked_users(viewer_id).await?;

        let mut ids: HashSet<String> = HashSet::with_capacity(signalled.len() + blocked.len() + 1);
        ids.insert(viewer_id.to_string());
        ids.extend(signalled);
        ids.extend(blocked);

        tracing::debug!("Excluding {} profiles for user {}", ids.len(), viewer_id);

        Ok(Self { ids })
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.ids.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers as a list, sorted for stable query parameters
    pub fn to_vec(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}
