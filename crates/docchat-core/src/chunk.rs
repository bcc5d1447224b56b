//! Sliding word-window text chunker.
//!
//! Splits a document into overlapping windows of whitespace-delimited
//! tokens. Each window is rejoined with single spaces to form the chunk
//! text, so runs of whitespace and line breaks in the source collapse.
//!
//! # Algorithm
//!
//! 1. Split the text on Unicode whitespace.
//! 2. Starting at token 0, take up to `window` tokens as a chunk.
//! 3. Advance the start by `window - overlap` (the stride).
//! 4. Stop once the start reaches the token count.
//!
//! The final chunk may hold fewer than `window` tokens. A stride of zero
//! would never terminate, so `overlap >= window` is rejected up front.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::make_chunks;
//!
//! let chunks = make_chunks("a b c d e", 2, 0).unwrap();
//! assert_eq!(chunks, vec!["a b", "c d", "e"]);
//! ```

use serde::Serialize;

use crate::error::RagError;

/// Default window size in tokens.
pub const DEFAULT_WINDOW: usize = 200;

/// Default overlap in tokens between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 50;

/// A window of source tokens `[start, end)` rejoined into text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of this chunk in the document, starting at 0.
    pub index: usize,
    /// Index of the first token.
    pub start: usize,
    /// Index one past the last token.
    pub end: usize,
    /// Tokens joined by single spaces.
    pub text: String,
}

impl Chunk {
    /// Number of tokens in this chunk.
    pub fn token_len(&self) -> usize {
        self.end - self.start
    }
}

/// Returns the stride `window - overlap`, or an error when it is not positive.
fn stride(window: usize, overlap: usize) -> Result<usize, RagError> {
    if window == 0 {
        return Err(RagError::InvalidConfiguration(
            "chunk window must be > 0".to_string(),
        ));
    }
    if overlap >= window {
        return Err(RagError::InvalidConfiguration(format!(
            "chunk overlap ({}) must be smaller than window ({})",
            overlap, window
        )));
    }
    Ok(window - overlap)
}

/// Split `text` into overlapping word windows.
///
/// Returns chunks with contiguous indices starting at 0. Empty or
/// whitespace-only text yields no chunks.
///
/// # Errors
///
/// [`RagError::InvalidConfiguration`] if `window == 0` or `overlap >= window`.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    let step = stride(window, overlap)?;
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let mut chunks = Vec::with_capacity(chunk_count(tokens.len(), window, overlap)?);
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + window).min(tokens.len());
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            end,
            text: tokens[start..end].join(" "),
        });
        start += step;
    }

    Ok(chunks)
}

/// Split `text` into overlapping word windows, returning only the texts.
///
/// See [`chunk_text`] for the algorithm and error conditions.
pub fn make_chunks(text: &str, window: usize, overlap: usize) -> Result<Vec<String>, RagError> {
    Ok(chunk_text(text, window, overlap)?
        .into_iter()
        .map(|c| c.text)
        .collect())
}

/// Number of chunks [`chunk_text`] produces for `token_count` tokens.
///
/// One chunk starts at every multiple of the stride below `token_count`,
/// so this is `ceil(token_count / (window - overlap))`. Trailing windows
/// that fall entirely inside the previous chunk are still emitted.
pub fn chunk_count(token_count: usize, window: usize, overlap: usize) -> Result<usize, RagError> {
    let step = stride(window, overlap)?;
    Ok(token_count.div_ceil(step))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_text() {
        assert!(make_chunks("", 200, 50).unwrap().is_empty());
        assert!(make_chunks("  \n\t ", 200, 50).unwrap().is_empty());
    }

    #[test]
    fn test_no_overlap() {
        let chunks = make_chunks("a b c d e", 2, 0).unwrap();
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_with_overlap() {
        let chunks = make_chunks("a b c d e", 3, 1).unwrap();
        assert_eq!(chunks, vec!["a b c", "c d e", "e"]);
    }

    #[test]
    fn test_text_shorter_than_overlap() {
        let chunks = make_chunks("only three words", 200, 50).unwrap();
        assert_eq!(chunks, vec!["only three words"]);
    }

    #[test]
    fn test_whitespace_collapsed() {
        let chunks = make_chunks("one\n\ntwo\tthree   four", 10, 2).unwrap();
        assert_eq!(chunks, vec!["one two three four"]);
    }

    #[test]
    fn test_overlap_equal_window_rejected() {
        let err = make_chunks("a b c", 2, 2).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_overlap_above_window_rejected() {
        let err = chunk_text("a b c", 2, 5).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            chunk_text("", 0, 0),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_chunk_count_formula() {
        for n in 0..60 {
            for window in 1..8 {
                for overlap in 0..window {
                    let text = words(n);
                    let chunks = chunk_text(&text, window, overlap).unwrap();
                    let expected = chunk_count(n, window, overlap).unwrap();
                    assert_eq!(
                        chunks.len(),
                        expected,
                        "n={} window={} overlap={}",
                        n,
                        window,
                        overlap
                    );
                }
            }
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = words(47);
        let (window, overlap) = (10, 3);
        let chunks = chunk_text(&text, window, overlap).unwrap();
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert_eq!(b.start, a.start + window - overlap);
            if b.token_len() == window {
                let a_tail: Vec<&str> = a.text.split(' ').rev().take(overlap).collect();
                let b_head: Vec<&str> = b.text.split(' ').take(overlap).collect();
                let a_tail: Vec<&str> = a_tail.into_iter().rev().collect();
                assert_eq!(a_tail, b_head);
            }
        }
    }

    #[test]
    fn test_only_last_chunk_short() {
        let chunks = chunk_text(&words(23), 5, 1).unwrap();
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|c| c.token_len() == 5));
        assert!(last.token_len() <= 5);
        assert_eq!(last.end, 23);
    }

    #[test]
    fn test_indices_contiguous() {
        let chunks = chunk_text(&words(100), 7, 2).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_spans_reproduce_token_slices() {
        let text = words(31);
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let first = chunk_text(&text, 6, 2).unwrap();
        let second = chunk_text(&text, 6, 2).unwrap();
        assert_eq!(first, second);
        for c in &first {
            assert_eq!(c.start, c.index * 4);
            assert_eq!(c.text, tokens[c.start..c.end].join(" "));
        }
    }
}
