//! Scripture assignment for newly enrolled competition children.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::{NewStudentScripture, ScriptureStatus};
use crate::storage::{ListQuery, StorageAdapter};

#[async_trait]
pub trait ScriptureAssigner: Send + Sync {
    /// Assign the cycle's scriptures to a child. Returns how many were added.
    async fn assign(&self, competition_cycle_id: &str, child_id: &str) -> Result<usize>;
}

/// Assigns every scripture of the cycle the child does not already have.
pub struct StoreScriptureAssigner {
    store: Arc<dyn StorageAdapter>,
}

impl StoreScriptureAssigner {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScriptureAssigner for StoreScriptureAssigner {
    async fn assign(&self, competition_cycle_id: &str, child_id: &str) -> Result<usize> {
        let mut scriptures = self
            .store
            .scriptures()
            .list(&ListQuery::new().eq("competition_cycle_id", competition_cycle_id))
            .await?;
        scriptures.sort_by_key(|s| s.sort_order);

        let existing: HashSet<String> = self
            .store
            .student_scriptures()
            .list(
                &ListQuery::new()
                    .eq("competition_cycle_id", competition_cycle_id)
                    .eq("child_id", child_id),
            )
            .await?
            .into_iter()
            .map(|s| s.scripture_id)
            .collect();

        let mut added = 0;
        for scripture in scriptures.iter().filter(|s| !existing.contains(&s.id)) {
            self.store
                .student_scriptures()
                .create(NewStudentScripture {
                    competition_cycle_id: competition_cycle_id.to_string(),
                    child_id: child_id.to_string(),
                    scripture_id: scripture.id.clone(),
                    status: ScriptureStatus::Assigned,
                    completed_at: None,
                })
                .await?;
            added += 1;
        }
        debug!(
            competition_cycle_id = competition_cycle_id,
            child_id = child_id,
            added = added,
            "Assigned scriptures"
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewScripture;
    use crate::storage::EmbeddedStore;

    #[tokio::test]
    async fn test_assign_skips_existing() {
        let store: Arc<dyn StorageAdapter> = Arc::new(EmbeddedStore::in_memory());
        for (i, reference) in ["John 3:16", "Psalm 23:1"].iter().enumerate() {
            store
                .scriptures()
                .create(NewScripture {
                    competition_cycle_id: "bee-2025".to_string(),
                    reference: reference.to_string(),
                    text: None,
                    sort_order: i as i32,
                })
                .await
                .unwrap();
        }
        let assigner = StoreScriptureAssigner::new(store.clone());

        assert_eq!(assigner.assign("bee-2025", "c1").await.unwrap(), 2);
        assert_eq!(assigner.assign("bee-2025", "c1").await.unwrap(), 0);
        assert_eq!(assigner.assign("bee-2025", "c2").await.unwrap(), 2);
        assert_eq!(assigner.assign("bee-2026", "c1").await.unwrap(), 0);
    }
}
