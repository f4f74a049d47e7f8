/// Words per retrieval segment.
pub const SEGMENT_WORDS: usize = 200;
/// Words shared between consecutive segments, so answers that straddle a
/// boundary stay retrievable.
pub const SEGMENT_OVERLAP: usize = 50;

/// One retrievable slice of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
}

/// Split extracted text into overlapping word windows. Deterministic: the
/// same text always yields the same segments. A document shorter than one
/// window yields exactly one segment covering the whole text.
pub fn segment_text(text: &str) -> Vec<Segment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= SEGMENT_WORDS {
        return vec![Segment {
            index: 0,
            text: words.join(" "),
        }];
    }

    let step = SEGMENT_WORDS - SEGMENT_OVERLAP;
    let mut segments = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + SEGMENT_WORDS).min(words.len());
        segments.push(Segment {
            index: segments.len(),
            text: words[start..end].join(" "),
        });
        if end == words.len() {
            break;
        }
        start += step;
    }
    segments
}
