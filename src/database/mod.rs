pub mod vector_db;

pub use vector_db::{ScoredSegment, VectorDB, VectorDBError};
