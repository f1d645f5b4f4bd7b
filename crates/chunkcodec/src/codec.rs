use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use crate::format::{DEFAULT_CEILING, DEFAULT_CHUNK_SIZE};
use crate::CodecError;

/// Chunking parameters: how many characters go into one chunk and how many
/// chunks a record may use.
///
/// Splitting depends on both parameters. Joining does not, which is what lets
/// a chunk set written with one chunk size be read back and rewritten with
/// another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCodec {
    chunk_size: usize,
    ceiling: usize,
}

impl ChunkCodec {
    pub fn new(chunk_size: usize, ceiling: usize) -> Result<Self, CodecError> {
        if chunk_size == 0 || ceiling == 0 {
            return Err(CodecError::InvalidParameters {
                chunk_size,
                ceiling,
            });
        }
        Ok(Self {
            chunk_size,
            ceiling,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Number of chunks `text` splits into: `ceil(chars / chunk_size)`.
    pub fn chunks_needed(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chunk_size)
    }

    /// Serializes `record` to JSON and splits the text.
    ///
    /// A record that serializes to `null` (such as `None`) is absent and
    /// yields no chunks.
    pub fn encode<T: Serialize + ?Sized>(&self, record: &T) -> Result<Vec<String>, CodecError> {
        let text = serde_json::to_string(record).map_err(CodecError::Serialize)?;
        if text == "null" {
            return Ok(Vec::new());
        }
        self.split_checked(&text)
    }

    /// Splits already-serialized JSON text into chunks.
    ///
    /// Empty text yields no chunks (no record). Text that is not a single
    /// JSON value is rejected so that it can never be stored and fail later.
    pub fn split(&self, text: &str) -> Result<Vec<String>, CodecError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        ensure_json(text)?;
        self.split_checked(text)
    }

    fn split_checked(&self, text: &str) -> Result<Vec<String>, CodecError> {
        let needed = self.chunks_needed(text);
        if needed > self.ceiling {
            return Err(CodecError::CeilingExceeded {
                needed,
                ceiling: self.ceiling,
            });
        }

        let mut chunks = Vec::with_capacity(needed);
        let mut rest = text;
        while !rest.is_empty() {
            // cut on a char boundary, never inside a multi-byte character
            let cut = rest
                .char_indices()
                .nth(self.chunk_size)
                .map_or(rest.len(), |(at, _)| at);
            let (head, tail) = rest.split_at(cut);
            chunks.push(head.to_string());
            rest = tail;
        }
        Ok(chunks)
    }

    /// Concatenates chunks in order and checks the result is JSON.
    ///
    /// No chunks means no record: [`CodecError::Empty`].
    pub fn join<S: AsRef<str>>(chunks: &[S]) -> Result<String, CodecError> {
        if chunks.is_empty() {
            return Err(CodecError::Empty);
        }
        let text: String = chunks.iter().map(|c| c.as_ref()).collect();
        ensure_json(&text)?;
        Ok(text)
    }

    /// Concatenates chunks in order and deserializes the record.
    pub fn decode<T: DeserializeOwned, S: AsRef<str>>(chunks: &[S]) -> Result<T, CodecError> {
        if chunks.is_empty() {
            return Err(CodecError::Empty);
        }
        let text: String = chunks.iter().map(|c| c.as_ref()).collect();
        serde_json::from_str(&text).map_err(|e| CodecError::Corrupt(e.to_string()))
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            ceiling: DEFAULT_CEILING,
        }
    }
}

fn ensure_json(text: &str) -> Result<(), CodecError> {
    serde_json::from_str::<IgnoredAny>(text)
        .map(|_| ())
        .map_err(|e| CodecError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: String,
        len: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Parts {
        parts: Vec<Part>,
    }

    fn codec(size: usize, ceiling: usize) -> ChunkCodec {
        ChunkCodec::new(size, ceiling).unwrap()
    }

    // -------------------- Splitting --------------------

    #[test]
    fn small_record_is_one_chunk() {
        let rec = Parts {
            parts: vec![Part {
                id: "A1".into(),
                len: 30.0,
            }],
        };
        let chunks = ChunkCodec::default().encode(&rec).unwrap();
        assert_eq!(chunks, vec![r#"{"parts":[{"id":"A1","len":30.0}]}"#.to_string()]);
        let back: Parts = ChunkCodec::decode(&chunks).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn split_cuts_at_chunk_size() {
        let text = r#"["abcdefghij"]"#; // 14 chars
        let chunks = codec(5, 20).split(text).unwrap();
        assert_eq!(chunks, vec![r#"["abc"#, "defgh", r#"ij"]"#]);
        assert_eq!(ChunkCodec::join(&chunks).unwrap(), text);
    }

    #[test]
    fn exact_multiple_has_no_short_chunk() {
        let text = "[1,2,3]"; // 7 chars
        let chunks = codec(7, 1).split(text).unwrap();
        assert_eq!(chunks, vec!["[1,2,3]"]);
    }

    #[test]
    fn chunk_size_counts_characters_not_bytes() {
        let text = r#""ÄÖÜ✓""#; // 6 chars, 11 bytes
        let chunks = codec(2, 10).split(text).unwrap();
        assert_eq!(chunks, vec!["\"Ä", "ÖÜ", "✓\""]);
        assert_eq!(codec(2, 10).chunks_needed(text), 3);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let chunks = codec(4, 2).split("").unwrap();
        assert!(chunks.is_empty());
        assert!(matches!(
            ChunkCodec::join(&chunks),
            Err(CodecError::Empty)
        ));
    }

    #[test]
    fn absent_record_has_no_chunks() {
        assert!(codec(4, 2).encode(&None::<Parts>).unwrap().is_empty());
        assert!(codec(4, 2).encode(&()).unwrap().is_empty());
        assert_eq!(codec(4, 2).encode(&Some(7)).unwrap(), vec!["7"]);
    }

    // -------------------- Failures --------------------

    #[test]
    fn ceiling_is_enforced() {
        let text = format!("\"{}\"", "x".repeat(98)); // 100 chars
        let err = codec(10, 9).split(&text).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CeilingExceeded {
                needed: 10,
                ceiling: 9
            }
        ));
        assert_eq!(codec(10, 10).split(&text).unwrap().len(), 10);
    }

    #[test]
    fn split_rejects_non_json() {
        assert!(matches!(
            codec(10, 2).split("{not json"),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn join_rejects_truncated_payload() {
        let chunks = codec(4, 10).split(r#"{"a":[1,2,3]}"#).unwrap();
        let missing_tail = &chunks[..chunks.len() - 1];
        assert!(matches!(
            ChunkCodec::join(missing_tail),
            Err(CodecError::Corrupt(_))
        ));
        assert!(matches!(
            ChunkCodec::decode::<serde_json::Value, _>(missing_tail),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn decode_of_nothing_is_empty() {
        let none: [&str; 0] = [];
        assert!(matches!(
            ChunkCodec::decode::<Parts, _>(&none),
            Err(CodecError::Empty)
        ));
    }

    #[test]
    fn zero_parameters_are_invalid() {
        assert!(ChunkCodec::new(0, 20).is_err());
        assert!(ChunkCodec::new(1000, 0).is_err());
        assert_eq!(
            ChunkCodec::default(),
            ChunkCodec::new(DEFAULT_CHUNK_SIZE, DEFAULT_CEILING).unwrap()
        );
    }

    // -------------------- Properties --------------------

    proptest! {
        #[test]
        fn join_reverses_split(s in "\\PC{0,300}", size in 1usize..64) {
            let text = serde_json::to_string(&s).unwrap();
            let chunks = codec(size, usize::MAX).split(&text).unwrap();
            prop_assert_eq!(ChunkCodec::join(&chunks).unwrap(), text);
        }

        #[test]
        fn chunk_lengths_are_bounded(s in "\\PC{0,300}", size in 1usize..64) {
            let text = serde_json::to_string(&s).unwrap();
            let c = codec(size, usize::MAX);
            let chunks = c.split(&text).unwrap();
            let chars = text.chars().count();

            prop_assert_eq!(chunks.len(), chars.div_ceil(size));
            prop_assert_eq!(chunks.len(), c.chunks_needed(&text));
            for (i, chunk) in chunks.iter().enumerate() {
                let n = chunk.chars().count();
                prop_assert!(n >= 1 && n <= size);
                if i + 1 < chunks.len() {
                    prop_assert_eq!(n, size);
                }
            }
        }

        #[test]
        fn typed_records_round_trip(
            ids in proptest::collection::vec("[A-Z][0-9]{1,3}", 0..40),
            size in 1usize..200,
        ) {
            let rec = Parts {
                parts: ids
                    .into_iter()
                    .enumerate()
                    .map(|(i, id)| Part { id, len: i as f64 * 0.5 })
                    .collect(),
            };
            let chunks = codec(size, usize::MAX).encode(&rec).unwrap();
            let back: Parts = ChunkCodec::decode(&chunks).unwrap();
            prop_assert_eq!(back, rec);
        }
    }
}
