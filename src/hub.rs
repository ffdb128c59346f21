use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::store::SessionStore;

/// State-change event fanned out to a session's live viewers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    UnitAdvanced {
        unit_id: u32,
        position: usize,
        word_count: usize,
    },
    PositionMoved {
        unit_id: u32,
        position: usize,
    },
    SessionEnded {
        final_unit_id: u32,
        final_position: usize,
    },
}

/// A live connection subscribed to a session's change events.
///
/// The engine never depends on a concrete transport; connection handling
/// plugs in behind this trait.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn notify(&self, event: &SessionEvent) -> Result<()>;
}

/// Delivers events to every registered observer of a session.
///
/// Delivery is fire-and-forget: `broadcast` returns once per-observer tasks
/// are spawned. A failed delivery deregisters that observer and never
/// blocks the others.
pub struct BroadcastHub {
    store: Arc<SessionStore>,
}

impl BroadcastHub {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn broadcast(&self, session_id: Uuid, event: SessionEvent) {
        let observers = self.store.list_observers(session_id);
        if observers.is_empty() {
            return;
        }
        debug!(
            %session_id,
            observers = observers.len(),
            "broadcasting session event"
        );
        let event = Arc::new(event);
        for (observer_id, observer) in observers {
            let store = Arc::clone(&self.store);
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                if let Err(err) = observer.notify(&event).await {
                    warn!(
                        %session_id,
                        observer_id,
                        error = %err,
                        "observer delivery failed, deregistering"
                    );
                    store.remove_observer(session_id, observer_id);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::EngineError;
    use crate::models::{ReferenceUnit, TraversalMode};

    struct CountingObserver {
        delivered: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Observer for CountingObserver {
        async fn notify(&self, _event: &SessionEvent) -> Result<()> {
            if self.fail {
                return Err(EngineError::Provider("connection closed".to_string()));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_unit() -> ReferenceUnit {
        ReferenceUnit {
            corpus_id: 1,
            unit_id: 1,
            text: "بسم الله".to_string(),
            words: vec!["بسم".to_string(), "الله".to_string()],
            page: 1,
            section: 1,
            subsection: 1,
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_observers() {
        let store = Arc::new(SessionStore::new());
        let session_id = store.create("reciter", TraversalMode::UnitSequential, test_unit());
        let delivered = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            store
                .add_observer(
                    session_id,
                    Arc::new(CountingObserver {
                        delivered: Arc::clone(&delivered),
                        fail: false,
                    }),
                )
                .unwrap();
        }

        let hub = BroadcastHub::new(Arc::clone(&store));
        hub.broadcast(
            session_id,
            SessionEvent::PositionMoved {
                unit_id: 1,
                position: 1,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_observer_is_deregistered() {
        let store = Arc::new(SessionStore::new());
        let session_id = store.create("reciter", TraversalMode::UnitSequential, test_unit());
        let delivered = Arc::new(AtomicUsize::new(0));

        store
            .add_observer(
                session_id,
                Arc::new(CountingObserver {
                    delivered: Arc::clone(&delivered),
                    fail: true,
                }),
            )
            .unwrap();
        store
            .add_observer(
                session_id,
                Arc::new(CountingObserver {
                    delivered: Arc::clone(&delivered),
                    fail: false,
                }),
            )
            .unwrap();

        let hub = BroadcastHub::new(Arc::clone(&store));
        hub.broadcast(
            session_id,
            SessionEvent::SessionEnded {
                final_unit_id: 1,
                final_position: 2,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The healthy observer still got the event
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        // The broken one is gone
        assert_eq!(store.list_observers(session_id).len(), 1);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = SessionEvent::UnitAdvanced {
            unit_id: 2,
            position: 0,
            word_count: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "unit_advanced");
        assert_eq!(json["unit_id"], 2);
        assert_eq!(json["position"], 0);
    }
}
