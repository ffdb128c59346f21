pub mod align;
pub mod error;
pub mod hub;
pub mod live;
pub mod models;
pub mod persist;
pub mod provider;
pub mod store;
pub mod wire;

pub use align::{compare, normalize, similarity, PositionIndex, Script, MATCH_THRESHOLD};
pub use error::{EngineError, Result};
pub use hub::{BroadcastHub, Observer, SessionEvent};
pub use live::{EngineConfig, SessionEngine, TranscriptOutcome};
pub use models::{
    AlignmentResult, AlignmentSummary, CorpusInfo, ReferenceUnit, Session, SessionPatch,
    SessionSnapshot, SessionStatus, TraversalMode, WordStatus,
};
pub use persist::{MemorySnapshotWriter, RestSnapshotWriter, SnapshotWriter};
pub use provider::memory::{load_corpus_file, StaticCorpus};
pub use provider::rest::{RestConfig, RestCorpus};
pub use provider::{resolve_unit, CorpusProvider, RawUnit};
pub use store::{ObserverId, SessionStore, StoreStats};
pub use wire::{ClientMessage, FragmentKind, ServerMessage};
