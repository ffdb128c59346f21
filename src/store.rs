use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::hub::Observer;
use crate::models::{
    AlignmentResult, ReferenceUnit, Session, SessionPatch, SessionSnapshot, SessionStatus,
    TraversalMode,
};

/// Handle for removing a registered observer.
pub type ObserverId = u64;

/// Aggregate store counters for monitoring collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub persisted_sessions: usize,
    pub total_observers: usize,
    pub sessions_with_observers: usize,
}

struct SessionEntry {
    session: Session,
    /// Copy of the current reference unit (word array drives alignment)
    unit: ReferenceUnit,
    /// Most recent provisional alignment, discarded on the next final call
    provisional: Vec<AlignmentResult>,
}

impl SessionEntry {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            unit: self.unit.clone(),
            provisional: self.provisional.clone(),
        }
    }
}

/// Concurrency-safe in-memory container for active sessions.
///
/// All interior locks are held only for short, non-suspending critical
/// sections; callers get snapshots, never references into live entries.
/// Multi-step transitions on one session serialize through the per-session
/// op lock handed out by [`SessionStore::op_lock`], while distinct sessions
/// proceed independently.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    observers: RwLock<HashMap<Uuid, Vec<(ObserverId, Arc<dyn Observer>)>>>,
    op_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    next_observer_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            observers: RwLock::new(HashMap::new()),
            op_locks: Mutex::new(HashMap::new()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    /// Insert a fresh session positioned at the start of `unit`.
    pub fn create(&self, owner_id: &str, mode: TraversalMode, unit: ReferenceUnit) -> Uuid {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let session = Session {
            session_id,
            owner_id: owner_id.to_string(),
            corpus_id: unit.corpus_id,
            unit_id: unit.unit_id,
            position: 0,
            traversal_mode: mode,
            status: SessionStatus::Active,
            is_persisted: false,
            created_at: now,
            updated_at: now,
        };

        self.sessions.write().unwrap_or_else(PoisonError::into_inner).insert(
            session_id,
            SessionEntry {
                session,
                unit,
                provisional: Vec::new(),
            },
        );
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, Vec::new());
        self.op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, Arc::new(tokio::sync::Mutex::new(())));

        info!(%session_id, owner = owner_id, "created session");
        session_id
    }

    /// Snapshot of a session, or `None` if absent.
    pub fn get(&self, session_id: Uuid) -> Option<SessionSnapshot> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map(SessionEntry::snapshot)
    }

    /// Merge a patch into a session; refreshes `updated_at`. False if absent.
    pub fn update(&self, session_id: Uuid, patch: SessionPatch) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        if let Some(position) = patch.position {
            entry.session.position = position;
        }
        if let Some(status) = patch.status {
            entry.session.status = status;
        }
        if let Some(mode) = patch.traversal_mode {
            entry.session.traversal_mode = mode;
        }
        entry.session.updated_at = Utc::now();
        true
    }

    /// Atomically switch a session to a new unit and position, replacing the
    /// cached word array and dropping provisional state.
    pub fn move_to(&self, session_id: Uuid, unit: ReferenceUnit, position: usize) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        entry.session.corpus_id = unit.corpus_id;
        entry.session.unit_id = unit.unit_id;
        entry.session.position = position;
        entry.session.updated_at = Utc::now();
        entry.unit = unit;
        entry.provisional.clear();
        true
    }

    /// Replace the transient provisional results for a session.
    pub fn set_provisional(&self, session_id: Uuid, results: Vec<AlignmentResult>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        entry.provisional = results;
        true
    }

    pub fn mark_persisted(&self, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        entry.session.is_persisted = true;
        true
    }

    /// Unconditional removal of the session, its observer set and op lock.
    pub fn delete(&self, session_id: Uuid) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id)
            .is_some();
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
        self.op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
        if removed {
            info!(%session_id, "deleted session");
        }
        removed
    }

    /// Register an observer; `None` if the session does not exist.
    pub fn add_observer(
        &self,
        session_id: Uuid,
        observer: Arc<dyn Observer>,
    ) -> Option<ObserverId> {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let set = observers.get_mut(&session_id)?;
        let observer_id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        set.push((observer_id, observer));
        Some(observer_id)
    }

    pub fn remove_observer(&self, session_id: Uuid, observer_id: ObserverId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(set) = observers.get_mut(&session_id) else {
            return false;
        };
        let before = set.len();
        set.retain(|(id, _)| *id != observer_id);
        set.len() != before
    }

    pub fn list_observers(&self, session_id: Uuid) -> Vec<(ObserverId, Arc<dyn Observer>)> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Per-session serialization point for multi-step transitions.
    /// `None` if the session does not exist.
    pub fn op_lock(&self, session_id: Uuid) -> Option<Arc<tokio::sync::Mutex<()>>> {
        self.op_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned()
    }

    pub fn stats(&self) -> StoreStats {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        let persisted = sessions
            .values()
            .filter(|e| e.session.is_persisted)
            .count();
        StoreStats {
            total_sessions: sessions.len(),
            active_sessions: sessions.len() - persisted,
            persisted_sessions: persisted,
            total_observers: observers.values().map(Vec::len).sum(),
            sessions_with_observers: observers.values().filter(|set| !set.is_empty()).count(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Result;
    use crate::hub::SessionEvent;

    struct NullObserver;

    #[async_trait]
    impl Observer for NullObserver {
        async fn notify(&self, _event: &SessionEvent) -> Result<()> {
            Ok(())
        }
    }

    fn unit(unit_id: u32, words: &[&str]) -> ReferenceUnit {
        ReferenceUnit {
            corpus_id: 1,
            unit_id,
            text: words.join(" "),
            words: words.iter().map(|w| w.to_string()).collect(),
            page: 1,
            section: 1,
            subsection: 1,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new();
        let id = store.create("reciter", TraversalMode::UnitSequential, unit(1, &["a", "b"]));
        let snapshot = store.get(id).unwrap();
        assert_eq!(snapshot.session.owner_id, "reciter");
        assert_eq!(snapshot.session.position, 0);
        assert_eq!(snapshot.session.status, SessionStatus::Active);
        assert!(!snapshot.session.is_persisted);
        assert_eq!(snapshot.word_count(), 2);
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_update_merges_and_touches_timestamp() {
        let store = SessionStore::new();
        let id = store.create("reciter", TraversalMode::UnitSequential, unit(1, &["a", "b"]));
        let before = store.get(id).unwrap().session.updated_at;

        assert!(store.update(
            id,
            SessionPatch {
                position: Some(1),
                ..Default::default()
            },
        ));
        let snapshot = store.get(id).unwrap();
        assert_eq!(snapshot.session.position, 1);
        assert!(snapshot.session.updated_at >= before);

        assert!(store.update(
            id,
            SessionPatch {
                traversal_mode: Some(TraversalMode::PageSequential),
                ..Default::default()
            },
        ));
        let snapshot = store.get(id).unwrap();
        assert_eq!(snapshot.session.traversal_mode, TraversalMode::PageSequential);
        // Unmentioned fields stay put
        assert_eq!(snapshot.session.position, 1);

        assert!(!store.update(Uuid::new_v4(), SessionPatch::default()));
    }

    #[test]
    fn test_move_to_replaces_unit_and_clears_provisional() {
        let store = SessionStore::new();
        let id = store.create("reciter", TraversalMode::UnitSequential, unit(1, &["a"]));
        store.set_provisional(
            id,
            vec![AlignmentResult {
                position: 0,
                expected: "a".to_string(),
                spoken: Some("a".to_string()),
                status: crate::models::WordStatus::ProvisionalMatched,
                similarity: Some(1.0),
            }],
        );

        assert!(store.move_to(id, unit(2, &["c", "d", "e"]), 0));
        let snapshot = store.get(id).unwrap();
        assert_eq!(snapshot.session.unit_id, 2);
        assert_eq!(snapshot.session.position, 0);
        assert_eq!(snapshot.word_count(), 3);
        assert!(snapshot.provisional.is_empty());
    }

    #[test]
    fn test_mark_persisted_and_delete() {
        let store = SessionStore::new();
        let id = store.create("reciter", TraversalMode::UnitSequential, unit(1, &["a"]));
        assert!(store.mark_persisted(id));
        assert!(store.get(id).unwrap().session.is_persisted);

        assert!(store.delete(id));
        assert!(store.get(id).is_none());
        assert!(store.op_lock(id).is_none());
        assert!(!store.delete(id));
    }

    #[test]
    fn test_observer_registry() {
        let store = SessionStore::new();
        let id = store.create("reciter", TraversalMode::UnitSequential, unit(1, &["a"]));

        let first = store.add_observer(id, Arc::new(NullObserver)).unwrap();
        let second = store.add_observer(id, Arc::new(NullObserver)).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.list_observers(id).len(), 2);

        assert!(store.remove_observer(id, first));
        assert!(!store.remove_observer(id, first));
        assert_eq!(store.list_observers(id).len(), 1);

        assert!(store.add_observer(Uuid::new_v4(), Arc::new(NullObserver)).is_none());
    }

    #[test]
    fn test_stats() {
        let store = SessionStore::new();
        let first = store.create("a", TraversalMode::UnitSequential, unit(1, &["x"]));
        let second = store.create("b", TraversalMode::PageSequential, unit(2, &["y"]));
        store.add_observer(first, Arc::new(NullObserver)).unwrap();
        store.mark_persisted(second);

        let stats = store.stats();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.persisted_sessions, 1);
        assert_eq!(stats.total_observers, 1);
        assert_eq!(stats.sessions_with_observers, 1);
    }
}
