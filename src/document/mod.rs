mod chunker;
mod extractor;

pub use chunker::{segment_text, Segment, SEGMENT_OVERLAP, SEGMENT_WORDS};
pub use extractor::{extract_text_from_bytes, extract_text_from_path};
