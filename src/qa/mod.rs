pub mod engine;

pub use engine::{DocumentIndex, QaAnswer, QaEngine, SegmentStore};
