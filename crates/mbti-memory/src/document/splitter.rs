use super::error::DocumentError;
use super::types::{Chunk, Document, DocumentMetadata};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Boundary markers in priority order. A cut lands right after the marker.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: default_separators(),
        }
    }
}

#[must_use]
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " "]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Splits text into overlapping chunks of at most `chunk_size` chars.
///
/// Chunk `i + 1` always begins with the last `chunk_overlap` chars of chunk `i`,
/// so stripping that prefix from every chunk after the first and concatenating
/// reproduces the input exactly.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    separators: Vec<Vec<char>>,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`DocumentError::Configuration`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        if config.chunk_size == 0 {
            return Err(DocumentError::Configuration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocumentError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let separators = config
            .separators
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().collect())
            .collect();
        Ok(Self { config, separators })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        self.boundaries(&chars)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                content: chars[start..end].iter().collect(),
                metadata: document.metadata.clone(),
                chunk_index: i,
                start,
                end,
            })
            .collect()
    }

    fn boundaries(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let n = chars.len();
        let mut out = Vec::new();
        let mut start = 0;

        while start < n {
            if n - start <= size {
                out.push((start, n));
                break;
            }
            // The cut must land past `start + overlap` so the next chunk makes progress.
            let lo = start + overlap + 1;
            let hi = start + size;
            let end = self
                .separators
                .iter()
                .find_map(|sep| last_cut(chars, sep, start, lo, hi))
                .unwrap_or(hi);
            out.push((start, end));
            start = end - overlap;
        }

        out
    }
}

/// Position right after the last occurrence of `sep` within `chars[start..hi]`
/// that falls in `lo..=hi`.
fn last_cut(chars: &[char], sep: &[char], start: usize, lo: usize, hi: usize) -> Option<usize> {
    let len = sep.len();
    if hi < start + len {
        return None;
    }
    let mut pos = hi - len;
    loop {
        let end = pos + len;
        if end < lo {
            return None;
        }
        if chars[pos..end] == *sep {
            return Some(end);
        }
        if pos == start {
            return None;
        }
        pos -= 1;
    }
}

/// Split raw text with the default separators.
///
/// # Errors
///
/// Returns [`DocumentError::Configuration`] for an invalid size/overlap pair.
pub fn split(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, DocumentError> {
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size,
        chunk_overlap,
        separators: default_separators(),
    })?;
    Ok(splitter.split(&Document {
        content: text.to_owned(),
        metadata: DocumentMetadata::default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(content: &str) -> Document {
        Document::from_text(content, "test")
    }

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
        })
        .unwrap()
    }

    fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.content);
            } else {
                out.extend(c.content.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn empty_document() {
        assert!(splitter(100, 10).split(&make_doc("")).is_empty());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = split("abc", 0, 0).unwrap_err();
        assert!(matches!(err, DocumentError::Configuration(_)));
    }

    #[test]
    fn overlap_not_smaller_than_size_rejected() {
        assert!(matches!(
            split("abc", 10, 10),
            Err(DocumentError::Configuration(_))
        ));
        assert!(matches!(
            split("abc", 10, 20),
            Err(DocumentError::Configuration(_))
        ));
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = splitter(1000, 100).split(&make_doc("Short text."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Short text.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 11));
    }

    #[test]
    fn hard_cut_without_separators() {
        let chunks = split("abcdefghij", 5, 0).unwrap();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcde", "fghij"]);
    }

    #[test]
    fn hard_cut_with_overlap() {
        let chunks = split("abcdefghijklmnopqrstuvwxyz", 10, 3).unwrap();
        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "hijklmnopq");
        assert_eq!(reassemble(&chunks, 3), "abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn prefers_paragraph_break() {
        let text = "first para line\n\nsecond para line that is long";
        let chunks = split(text, 25, 0).unwrap();
        assert_eq!(chunks[0].content, "first para line\n\n");
    }

    #[test]
    fn falls_back_to_line_break_then_space() {
        let chunks = split("one two\nthree four five", 12, 0).unwrap();
        assert_eq!(chunks[0].content, "one two\n");

        let chunks = split("alpha beta gamma delta", 12, 0).unwrap();
        assert_eq!(chunks[0].content, "alpha beta ");
    }

    #[test]
    fn overlap_is_exact_char_suffix() {
        let text = "Lorem ipsum dolor sit amet. Consectetur adipiscing elit.\nSed do eiusmod.";
        let overlap = 7;
        let chunks = split(text, 20, overlap).unwrap();
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let suffix: String = prev[prev.len() - overlap..].iter().collect();
            let prefix: String = pair[1].content.chars().take(overlap).collect();
            assert_eq!(suffix, prefix);
        }
        assert_eq!(reassemble(&chunks, overlap), text);
    }

    #[test]
    fn multibyte_text_measured_in_chars() {
        let text = "외향형은 에너지를 밖에서 얻는다\n내향형은 혼자 있을 때 충전된다";
        let chunks = split(text, 10, 2).unwrap();
        for c in &chunks {
            assert!(c.content.chars().count() <= 10);
        }
        assert_eq!(reassemble(&chunks, 2), text);
    }

    #[test]
    fn offsets_track_source_positions() {
        let text = "abcdefghijklmnop";
        let chunks = split(text, 6, 2).unwrap();
        for c in &chunks {
            let slice: String = text.chars().skip(c.start).take(c.end - c.start).collect();
            assert_eq!(slice, c.content);
        }
        assert_eq!(chunks.last().unwrap().end, 16);
    }

    #[test]
    fn metadata_preserved() {
        let chunks = splitter(100, 0).split(&make_doc("Some content."));
        assert_eq!(chunks[0].metadata.source, "test");
    }

    #[test]
    fn empty_separators_ignored() {
        let s = TextSplitter::new(SplitterConfig {
            chunk_size: 4,
            chunk_overlap: 0,
            separators: vec![String::new()],
        })
        .unwrap();
        let chunks = s.split(&make_doc("abcdefgh"));
        assert_eq!(chunks.len(), 2);
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn round_trip_reproduces_input(
                content in "\\PC{0,2000}",
                chunk_size in 1usize..300,
                overlap_frac in 0.0f64..1.0,
            ) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                let overlap = ((chunk_size as f64) * overlap_frac) as usize;
                let overlap = overlap.min(chunk_size - 1);
                let chunks = split(&content, chunk_size, overlap).unwrap();
                prop_assert_eq!(reassemble(&chunks, overlap), content);
            }

            #[test]
            fn chunks_respect_size_and_indices(
                content in "[a-z .\n]{1,1000}",
                chunk_size in 2usize..120,
                overlap in 0usize..2,
            ) {
                let chunks = split(&content, chunk_size, overlap).unwrap();
                prop_assert!(!chunks.is_empty());
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.chunk_index, i);
                    prop_assert!(!chunk.content.is_empty());
                    prop_assert!(chunk.content.chars().count() <= chunk_size);
                }
            }

            #[test]
            fn split_is_idempotent(
                content in "[a-zA-Z .,\n]{0,800}",
                chunk_size in 5usize..100,
            ) {
                let a = split(&content, chunk_size, 2).unwrap();
                let b = split(&content, chunk_size, 2).unwrap();
                prop_assert_eq!(a, b);
            }
        }
    }
}
