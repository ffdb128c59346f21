use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{EngineError, Result};
use crate::models::Session;
use crate::provider::rest::RestConfig;

/// Durable sink for the single end-of-session snapshot write.
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    async fn write_snapshot(&self, session: &Session) -> Result<()>;
}

/// Test/CLI writer that records snapshots in memory.
#[derive(Default)]
pub struct MemorySnapshotWriter {
    snapshots: Mutex<Vec<Session>>,
}

impl MemorySnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every snapshot written so far.
    pub fn written(&self) -> Vec<Session> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SnapshotWriter for MemorySnapshotWriter {
    async fn write_snapshot(&self, session: &Session) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(())
    }
}

/// Snapshot writer backed by a PostgREST-style HTTP API.
pub struct RestSnapshotWriter {
    client: Client,
    config: RestConfig,
}

impl RestSnapshotWriter {
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SnapshotWriter for RestSnapshotWriter {
    async fn write_snapshot(&self, session: &Session) -> Result<()> {
        let url = format!(
            "{}/session_snapshots",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(session)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Provider(format!(
                "snapshot write returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{SessionStatus, TraversalMode};

    fn session() -> Session {
        let now = Utc::now();
        Session {
            session_id: Uuid::new_v4(),
            owner_id: "reciter".to_string(),
            corpus_id: 1,
            unit_id: 1,
            position: 4,
            traversal_mode: TraversalMode::UnitSequential,
            status: SessionStatus::Ended,
            is_persisted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_memory_writer_records_snapshots() {
        let writer = MemorySnapshotWriter::new();
        let session = session();
        writer.write_snapshot(&session).await.unwrap();
        let written = writer.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].session_id, session.session_id);
        assert_eq!(written[0].status, SessionStatus::Ended);
    }
}
