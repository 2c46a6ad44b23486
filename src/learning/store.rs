use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::errors::MobiClawResult;
use crate::model::{ContextKey, LearningEntry, Observation};
use crate::store::LearningRepository;

/// Outcome history keyed by context, shared by every instruction in the process.
///
/// Writes to one context are serialised by a per-key async lock so concurrent
/// instructions touching the same UI context cannot lose use-count or confidence
/// updates. Unrelated contexts never contend.
pub struct LearningStore {
    repo: Arc<dyn LearningRepository>,
    enabled: bool,
    key_locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LearningStore {
    pub fn new(repo: Arc<dyn LearningRepository>, enabled: bool) -> Self {
        Self {
            repo,
            enabled,
            key_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, context: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(context.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Read-modify-write for one context. Returns the stored entry, or `None` when
    /// learning is switched off.
    pub async fn record(
        &self,
        key: &ContextKey,
        observation: Observation,
    ) -> MobiClawResult<Option<LearningEntry>> {
        if !self.enabled {
            return Ok(None);
        }
        let context = key.render();
        let lock = self.lock_for(&context);
        let _guard = lock.lock().await;

        let entry = match self.repo.find_by_context(&context).await? {
            Some(mut existing) => {
                existing.observe(observation);
                existing
            }
            None => LearningEntry::first_observation(key.clone(), observation),
        };
        self.repo.save_entry(&entry).await?;

        tracing::debug!(
            context = %context,
            successful = entry.successful,
            use_count = entry.use_count,
            confidence = entry.confidence(),
            "learning entry recorded"
        );
        Ok(Some(entry))
    }

    /// Entry for `key` if its confidence is at or above `threshold`. Absence is not an error.
    pub async fn query(
        &self,
        key: &ContextKey,
        threshold: f64,
    ) -> MobiClawResult<Option<LearningEntry>> {
        if !self.enabled {
            return Ok(None);
        }
        let entry = self.repo.find_by_context(&key.render()).await?;
        Ok(entry.filter(|e| e.confidence() >= threshold))
    }

    /// Correction text from a confident failure-with-fix entry.
    pub async fn past_correction(
        &self,
        key: &ContextKey,
        threshold: f64,
    ) -> MobiClawResult<Option<String>> {
        Ok(self
            .query(key, threshold)
            .await?
            .filter(LearningEntry::is_correction)
            .and_then(|e| e.correction))
    }

    pub async fn has_past_failures(&self, key: &ContextKey) -> MobiClawResult<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let entry = self.repo.find_by_context(&key.render()).await?;
        Ok(entry.map_or(false, |e| !e.successful))
    }

    pub async fn entries(&self) -> MobiClawResult<Vec<LearningEntry>> {
        self.repo.list_entries().await
    }
}
