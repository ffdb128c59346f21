use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::align::compare;
use crate::error::{EngineError, Result};
use crate::hub::{BroadcastHub, SessionEvent};
use crate::models::{
    AlignmentResult, AlignmentSummary, ReferenceUnit, Session, SessionPatch, SessionSnapshot,
    SessionStatus, TraversalMode,
};
use crate::persist::SnapshotWriter;
use crate::provider::CorpusProvider;
use crate::store::SessionStore;

/// Tunables for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Expected-word lookahead per transcript fragment; bounds per-call cost
    /// while leaving room for a few words spoken ahead of the known-correct
    /// position
    pub lookahead_words: usize,
    /// Grace period between ending a session and sweeping it from memory,
    /// so in-flight observer notifications can still be delivered
    pub cleanup_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_words: 10,
            cleanup_delay: Duration::from_secs(2),
        }
    }
}

/// What one transcript fragment did to the session.
#[derive(Debug, Clone)]
pub struct TranscriptOutcome {
    pub session_id: Uuid,
    pub is_final: bool,
    /// Per-word verdicts, re-based to absolute positions within the unit
    pub results: Vec<AlignmentResult>,
    /// Present only for final fragments
    pub summary: Option<AlignmentSummary>,
    /// Position after this fragment was applied
    pub position: usize,
    /// Unit the session is on after this fragment
    pub unit_id: u32,
    /// Set when completing the unit moved the session to a successor
    pub advanced_to: Option<u32>,
    /// True when completing the unit ended the session instead
    pub ended: bool,
}

enum Advance {
    Moved(u32),
    Ended,
}

/// Session lifecycle and position advancement across the reference corpus.
///
/// All transitions for one session serialize through its op lock; provider
/// and persistence I/O happen while holding that lock but never while
/// holding a store lock, so distinct sessions never block each other.
/// Broadcasts are initiated after the in-memory mutation commits.
pub struct SessionEngine {
    store: Arc<SessionStore>,
    provider: Arc<dyn CorpusProvider>,
    writer: Arc<dyn SnapshotWriter>,
    hub: BroadcastHub,
    config: EngineConfig,
}

impl SessionEngine {
    pub fn new(
        store: Arc<SessionStore>,
        provider: Arc<dyn CorpusProvider>,
        writer: Arc<dyn SnapshotWriter>,
        config: EngineConfig,
    ) -> Self {
        let hub = BroadcastHub::new(Arc::clone(&store));
        Self {
            store,
            provider,
            writer,
            hub,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start a session at position 0 of the given unit.
    pub async fn start(
        &self,
        owner_id: &str,
        corpus_id: u32,
        unit_id: u32,
        mode: TraversalMode,
    ) -> Result<SessionSnapshot> {
        if owner_id.is_empty() {
            return Err(EngineError::InvalidInput("owner_id is empty".to_string()));
        }
        let unit = self
            .provider
            .unit(corpus_id, unit_id)
            .await?
            .ok_or(EngineError::UnitNotFound { corpus_id, unit_id })?;

        let session_id = self.store.create(owner_id, mode, unit);
        info!(%session_id, corpus_id, unit_id, ?mode, "session started");
        self.store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    /// Align one transcript fragment against the session's lookahead window.
    ///
    /// Final fragments advance `position` by the matched count (matched only;
    /// mismatched and skipped words stay unconfirmed) and trigger unit
    /// advancement when the unit completes. Provisional fragments only stash
    /// their results for status queries.
    pub async fn apply_transcript(
        &self,
        session_id: Uuid,
        text: &str,
        is_final: bool,
    ) -> Result<TranscriptOutcome> {
        let op_lock = self
            .store
            .op_lock(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let _guard = op_lock.lock().await;

        let snapshot = self
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        if snapshot.session.status == SessionStatus::Ended {
            return Err(EngineError::SessionEnded(session_id));
        }

        let position = snapshot.session.position;
        let words = &snapshot.unit.words;
        let window_end = (position + self.config.lookahead_words).min(words.len());
        let window = &words[position..window_end];

        let (mut results, summary) = compare(window, text, is_final);
        for result in &mut results {
            result.position += position;
        }

        if !is_final {
            debug!(%session_id, position, "provisional fragment aligned");
            self.store.set_provisional(session_id, results.clone());
            return Ok(TranscriptOutcome {
                session_id,
                is_final,
                results,
                summary: None,
                position,
                unit_id: snapshot.session.unit_id,
                advanced_to: None,
                ended: false,
            });
        }

        let new_position = position + summary.matched;
        self.store.update(
            session_id,
            SessionPatch {
                position: Some(new_position),
                ..Default::default()
            },
        );
        self.store.set_provisional(session_id, Vec::new());
        debug!(
            %session_id,
            matched = summary.matched,
            mismatched = summary.mismatched,
            skipped = summary.skipped,
            new_position,
            "final fragment applied"
        );

        let mut outcome = TranscriptOutcome {
            session_id,
            is_final,
            results,
            summary: Some(summary),
            position: new_position,
            unit_id: snapshot.session.unit_id,
            advanced_to: None,
            ended: false,
        };

        if new_position >= words.len() {
            match self.advance_locked(session_id).await? {
                Advance::Moved(unit_id) => {
                    outcome.advanced_to = Some(unit_id);
                    outcome.unit_id = unit_id;
                    outcome.position = 0;
                }
                Advance::Ended => {
                    outcome.ended = true;
                }
            }
        } else if summary.matched > 0 {
            self.hub.broadcast(
                session_id,
                SessionEvent::PositionMoved {
                    unit_id: snapshot.session.unit_id,
                    position: new_position,
                },
            );
        }

        Ok(outcome)
    }

    /// Explicit manual jump to a unit/position, not driven by alignment.
    /// An out-of-range position clamps to 0 for the target unit.
    pub async fn move_to(
        &self,
        session_id: Uuid,
        unit_id: u32,
        position: usize,
    ) -> Result<SessionSnapshot> {
        let op_lock = self
            .store
            .op_lock(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let _guard = op_lock.lock().await;

        let snapshot = self
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        if snapshot.session.status == SessionStatus::Ended {
            return Err(EngineError::SessionEnded(session_id));
        }

        let corpus_id = snapshot.session.corpus_id;
        let unit = self
            .provider
            .unit(corpus_id, unit_id)
            .await?
            .ok_or(EngineError::UnitNotFound { corpus_id, unit_id })?;

        let position = if position > unit.words.len() { 0 } else { position };
        self.store.move_to(session_id, unit, position);
        info!(%session_id, unit_id, position, "session moved");

        self.hub.broadcast(
            session_id,
            SessionEvent::PositionMoved { unit_id, position },
        );

        self.store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    /// End a session: one durable snapshot write, then in-memory commit,
    /// observer notification and deferred removal.
    pub async fn end(&self, session_id: Uuid) -> Result<Session> {
        let op_lock = self
            .store
            .op_lock(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let _guard = op_lock.lock().await;
        self.end_locked(session_id).await
    }

    /// Read-only projection of the session, its current unit and the latest
    /// provisional results. Never mutates.
    pub fn status(&self, session_id: Uuid) -> Option<SessionSnapshot> {
        self.store.get(session_id)
    }

    /// Find the successor unit under the session's traversal mode and move
    /// to it, or end the session when none exists. Caller holds the op lock.
    async fn advance_locked(&self, session_id: Uuid) -> Result<Advance> {
        let snapshot = self
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let session = &snapshot.session;

        let next = match session.traversal_mode {
            TraversalMode::UnitSequential => {
                let info = self
                    .provider
                    .corpus_info(session.corpus_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Provider(format!(
                            "no corpus info for corpus {}",
                            session.corpus_id
                        ))
                    })?;
                let next_unit_id = session.unit_id + 1;
                if next_unit_id <= info.unit_count {
                    let unit = self
                        .provider
                        .unit(session.corpus_id, next_unit_id)
                        .await?
                        .ok_or(EngineError::UnitNotFound {
                            corpus_id: session.corpus_id,
                            unit_id: next_unit_id,
                        })?;
                    Some(unit)
                } else {
                    None
                }
            }
            TraversalMode::PageSequential => {
                let units = self.provider.units_by_page(snapshot.unit.page).await?;
                successor_in(units, session)
            }
            TraversalMode::SectionSequential => {
                let units = self.provider.units_by_section(snapshot.unit.section).await?;
                successor_in(units, session)
            }
        };

        match next {
            Some(unit) => {
                let unit_id = unit.unit_id;
                let word_count = unit.words.len();
                self.store.move_to(session_id, unit, 0);
                info!(%session_id, unit_id, word_count, "advanced to next unit");
                self.hub.broadcast(
                    session_id,
                    SessionEvent::UnitAdvanced {
                        unit_id,
                        position: 0,
                        word_count,
                    },
                );
                Ok(Advance::Moved(unit_id))
            }
            None => {
                self.end_locked(session_id).await?;
                Ok(Advance::Ended)
            }
        }
    }

    /// End implementation; caller holds the op lock. The durable write goes
    /// first so a persistence failure leaves the session active and the
    /// operation retryable.
    async fn end_locked(&self, session_id: Uuid) -> Result<Session> {
        let snapshot = self
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        if snapshot.session.status == SessionStatus::Ended {
            return Err(EngineError::SessionEnded(session_id));
        }

        let mut final_session = snapshot.session.clone();
        final_session.status = SessionStatus::Ended;
        final_session.updated_at = chrono::Utc::now();

        self.writer.write_snapshot(&final_session).await?;

        self.store.update(
            session_id,
            SessionPatch {
                status: Some(SessionStatus::Ended),
                ..Default::default()
            },
        );
        self.store.mark_persisted(session_id);
        info!(
            %session_id,
            final_unit = final_session.unit_id,
            final_position = final_session.position,
            "session ended and persisted"
        );

        self.hub.broadcast(
            session_id,
            SessionEvent::SessionEnded {
                final_unit_id: final_session.unit_id,
                final_position: final_session.position,
            },
        );

        let store = Arc::clone(&self.store);
        let delay = self.config.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.delete(session_id);
        });

        final_session.is_persisted = true;
        Ok(final_session)
    }
}

/// The unit after the session's current one in an ordered unit list, if any.
fn successor_in(units: Vec<ReferenceUnit>, session: &Session) -> Option<ReferenceUnit> {
    let mut found_current = false;
    for unit in units {
        if found_current {
            return Some(unit);
        }
        if unit.corpus_id == session.corpus_id && unit.unit_id == session.unit_id {
            found_current = true;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemorySnapshotWriter;
    use crate::provider::{RawUnit, memory::StaticCorpus};

    fn raw(unit_id: u32, page: u32, text: &str) -> RawUnit {
        RawUnit {
            corpus_id: 1,
            unit_id,
            text: text.to_string(),
            words_array: None,
            page,
            section: 1,
            subsection: 1,
        }
    }

    fn engine(units: Vec<RawUnit>) -> (SessionEngine, Arc<MemorySnapshotWriter>) {
        let writer = Arc::new(MemorySnapshotWriter::new());
        let engine = SessionEngine::new(
            Arc::new(SessionStore::new()),
            Arc::new(StaticCorpus::new(units)),
            Arc::clone(&writer) as Arc<dyn SnapshotWriter>,
            EngineConfig {
                lookahead_words: 10,
                cleanup_delay: Duration::from_millis(50),
            },
        );
        (engine, writer)
    }

    #[tokio::test]
    async fn test_start_requires_valid_unit() {
        let (engine, _) = engine(vec![raw(1, 1, "بسم الله")]);
        let err = engine
            .start("reciter", 1, 99, TraversalMode::UnitSequential)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = engine
            .start("", 1, 1, TraversalMode::UnitSequential)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn test_provisional_fragment_does_not_move_position() {
        let (engine, _) = engine(vec![raw(1, 1, "بسم الله الرحمن الرحيم")]);
        let snapshot = engine
            .start("reciter", 1, 1, TraversalMode::UnitSequential)
            .await
            .unwrap();
        let id = snapshot.session.session_id;

        let outcome = engine.apply_transcript(id, "بسم الله", false).await.unwrap();
        assert!(outcome.summary.is_none());
        assert_eq!(outcome.position, 0);

        let status = engine.status(id).unwrap();
        assert_eq!(status.session.position, 0);
        assert_eq!(status.provisional.len(), 4);
    }

    #[tokio::test]
    async fn test_final_fragment_clears_provisional() {
        let (engine, _) = engine(vec![raw(1, 1, "بسم الله الرحمن الرحيم")]);
        let id = engine
            .start("reciter", 1, 1, TraversalMode::UnitSequential)
            .await
            .unwrap()
            .session
            .session_id;

        engine.apply_transcript(id, "بسم", false).await.unwrap();
        assert!(!engine.status(id).unwrap().provisional.is_empty());

        engine.apply_transcript(id, "بسم", true).await.unwrap();
        let status = engine.status(id).unwrap();
        assert!(status.provisional.is_empty());
        assert_eq!(status.session.position, 1);
    }

    #[tokio::test]
    async fn test_move_to_clamps_out_of_range_position() {
        let (engine, _) = engine(vec![raw(1, 1, "بسم الله"), raw(2, 1, "الحمد لله رب")]);
        let id = engine
            .start("reciter", 1, 1, TraversalMode::UnitSequential)
            .await
            .unwrap()
            .session
            .session_id;

        let snapshot = engine.move_to(id, 2, 99).await.unwrap();
        assert_eq!(snapshot.session.unit_id, 2);
        assert_eq!(snapshot.session.position, 0);

        let snapshot = engine.move_to(id, 2, 3).await.unwrap();
        assert_eq!(snapshot.session.position, 3);

        let err = engine.move_to(id, 42, 0).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        // Failed move commits nothing
        assert_eq!(engine.status(id).unwrap().session.unit_id, 2);
    }

    #[tokio::test]
    async fn test_results_rebased_to_absolute_positions() {
        let (engine, _) = engine(vec![raw(1, 1, "بسم الله الرحمن الرحيم")]);
        let id = engine
            .start("reciter", 1, 1, TraversalMode::UnitSequential)
            .await
            .unwrap()
            .session
            .session_id;

        engine.apply_transcript(id, "بسم الله", true).await.unwrap();
        let outcome = engine.apply_transcript(id, "الرحمن", true).await.unwrap();
        assert_eq!(outcome.results[0].position, 2);
    }
}
