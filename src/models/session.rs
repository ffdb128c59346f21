use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AlignmentResult, ReferenceUnit};

/// Lifecycle state of a session. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Policy governing which reference unit follows the current one when a
/// unit is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Next unit id within the same corpus, ending at the corpus boundary
    UnitSequential,
    /// Next unit on the same page, ending at the page boundary
    PageSequential,
    /// Next unit in the same section, ending at the section boundary
    SectionSequential,
}

/// Canonical record of one reciter's live activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: Uuid,
    /// Opaque owner/user identifier
    pub owner_id: String,
    /// Current reference unit
    pub corpus_id: u32,
    pub unit_id: u32,
    /// Index into the current unit's word array; `0 <= position <= word_count`
    pub position: usize,
    pub traversal_mode: TraversalMode,
    pub status: SessionStatus,
    /// True once the durable end-of-session write has happened
    pub is_persisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update merged into a session by `SessionStore::update`.
/// Unit changes go through `SessionStore::move_to` instead, which also
/// swaps the cached word array.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub position: Option<usize>,
    pub status: Option<SessionStatus>,
    pub traversal_mode: Option<TraversalMode>,
}

/// Read-only projection of a session handed to callers.
///
/// Snapshots are copies; callers never receive references into the live
/// store entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    /// Copy of the current reference unit
    pub unit: ReferenceUnit,
    /// Results of the most recent provisional alignment, if any
    pub provisional: Vec<AlignmentResult>,
}

impl SessionSnapshot {
    /// Number of expected words in the current unit
    pub fn word_count(&self) -> usize {
        self.unit.words.len()
    }
}
