pub mod engine;
pub mod normalize;
pub mod similarity;

pub use engine::{compare, PositionIndex};
pub use normalize::{normalize, Script};
pub use similarity::{similarity, MATCH_THRESHOLD};
