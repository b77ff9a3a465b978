use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use crate::error::{AuditError, Result};
use super::state::TransferState;

/// Keyed map of live transfers. Every entry has its own lock so that
/// simultaneous sends and receives only contend on the map itself during
/// insert and remove.
#[derive(Default)]
pub struct TransferSessions {
    sessions: RwLock<HashMap<String, Arc<Mutex<TransferState>>>>,
}

impl TransferSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, state: TransferState) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&state.transfer_id) {
            return Err(AuditError::DuplicateTransfer(state.transfer_id));
        }
        sessions.insert(state.transfer_id.clone(), Arc::new(Mutex::new(state)));
        Ok(())
    }

    pub async fn get(&self, transfer_id: &str) -> Option<TransferState> {
        let entry = self.entry(transfer_id).await?;
        let state = entry.lock().await;
        Some(state.clone())
    }

    /// Applies `f` to a copy of the session and stores the copy only when
    /// `f` succeeds, so a rejected transition leaves the stored state as it was.
    pub async fn update<F, R>(&self, transfer_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut TransferState) -> Result<R>,
    {
        let entry = self
            .entry(transfer_id)
            .await
            .ok_or_else(|| AuditError::TransferNotFound(transfer_id.to_string()))?;

        let mut guard = entry.lock().await;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }

    /// Starts the next attempt of a retryable failed session. Both records
    /// stay in the map; the failed one is marked superseded under its lock,
    /// so concurrent retries of the same id yield a single new attempt.
    pub async fn retry(&self, transfer_id: &str) -> Result<String> {
        let entry = self
            .entry(transfer_id)
            .await
            .ok_or_else(|| AuditError::TransferNotFound(transfer_id.to_string()))?;

        let mut guard = entry.lock().await;
        let mut failed = guard.clone();
        let next = failed.retry()?;
        let next_id = next.transfer_id.clone();
        self.insert(next).await?;
        *guard = failed;
        Ok(next_id)
    }

    pub async fn remove(&self, transfer_id: &str) -> Option<TransferState> {
        let entry = self.sessions.write().await.remove(transfer_id)?;
        let state = entry.lock().await;
        Some(state.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<TransferState> {
        let entries: Vec<Arc<Mutex<TransferState>>> =
            self.sessions.read().await.values().cloned().collect();
        let mut states = Vec::with_capacity(entries.len());
        for entry in entries {
            states.push(entry.lock().await.clone());
        }
        states.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        states
    }

    pub async fn active(&self) -> Vec<TransferState> {
        self.snapshot().await.into_iter().filter(|s| s.is_active()).collect()
    }

    pub async fn resumable(&self) -> Vec<TransferState> {
        self.snapshot().await.into_iter().filter(|s| s.is_resumable()).collect()
    }

    async fn entry(&self, transfer_id: &str) -> Option<Arc<Mutex<TransferState>>> {
        self.sessions.read().await.get(transfer_id).cloned()
    }
}
