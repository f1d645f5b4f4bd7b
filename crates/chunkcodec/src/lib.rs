//! # Chunkcodec
//!
//! Splits a serialized JSON payload into bounded text chunks and reassembles
//! it. Used to persist records that do not fit one host slot.
//!
//! ## Chunk set layout
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ <BASE>INFO   [Int(count)]                      │
//! ├────────────────────────────────────────────────┤
//! │ <BASE>0      [Text(chars 0 .. S)]              │
//! │ <BASE>1      [Text(chars S .. 2S)]             │
//! │ ...                                            │
//! │ <BASE>n-1    [Text(remaining chars, <= S)]     │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! `S` is the chunk size in characters and `n = ceil(len / S)`. Chunks are
//! plain substrings: concatenating them in index order reproduces the exact
//! serialized text. `n` never exceeds the configured ceiling.
//!
//! This crate is pure: it knows the namespace naming scheme but never touches
//! a host.

mod codec;
mod format;

use thiserror::Error;

pub use codec::ChunkCodec;
pub use format::{
    chunk_namespace, info_namespace, layout_namespaces, DEFAULT_CEILING, DEFAULT_CHUNK_SIZE,
    INFO_SUFFIX,
};

#[derive(Debug, Error)]
pub enum CodecError {
    /// There are no chunks, so there is no record.
    #[error("payload is empty")]
    Empty,
    #[error("corrupt payload: {0}")]
    Corrupt(String),
    #[error("payload needs {needed} chunks but the ceiling is {ceiling}")]
    CeilingExceeded { needed: usize, ceiling: usize },
    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("chunk size and ceiling must be at least 1 (got {chunk_size} and {ceiling})")]
    InvalidParameters { chunk_size: usize, ceiling: usize },
}
