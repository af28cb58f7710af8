use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEntry {
    pub status: JobState,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-process status board for background syncs, keyed by org or board.
/// Not persisted; the `sync_jobs` table is the durable record.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<tokio::sync::Mutex<HashMap<String, JobEntry>>>,
}

fn timestamp() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl JobRegistry {
    /// Mark `key` running. Returns false, leaving the entry alone, if a run
    /// for the same key is still in flight.
    pub async fn try_start(&self, key: &str) -> bool {
        let mut jobs = self.inner.lock().await;
        if matches!(jobs.get(key), Some(entry) if entry.status == JobState::Running) {
            return false;
        }
        jobs.insert(
            key.to_string(),
            JobEntry {
                status: JobState::Running,
                started_at: timestamp(),
                completed_at: None,
                failed_at: None,
                result: None,
                error: None,
            },
        );
        true
    }

    pub async fn complete(&self, key: &str, result: Value) {
        let mut jobs = self.inner.lock().await;
        if let Some(entry) = jobs.get_mut(key) {
            entry.status = JobState::Completed;
            entry.completed_at = Some(timestamp());
            entry.result = Some(result);
        }
    }

    pub async fn fail(&self, key: &str, error: String) {
        let mut jobs = self.inner.lock().await;
        if let Some(entry) = jobs.get_mut(key) {
            entry.status = JobState::Failed;
            entry.failed_at = Some(timestamp());
            entry.error = Some(error);
        }
    }

    pub async fn get(&self, key: &str) -> Option<JobEntry> {
        self.inner.lock().await.get(key).cloned()
    }
}
