//! Error types for the attribute stores.

use chunkcodec::CodecError;
use slotstore::{HostError, Owner};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write hit a namespace missing from the drawing's namespace table.
    /// Reads never produce this; they report the record as absent.
    #[error("namespace {0:?} is not registered")]
    NamespaceNotRegistered(String),

    #[error("corrupt payload under {namespace:?} on {owner}: {reason}")]
    CorruptPayload {
        owner: Owner,
        namespace: String,
        reason: String,
    },

    #[error("record under {namespace:?} on {owner} needs {needed} chunks, ceiling is {ceiling}")]
    ChunkCeilingExceeded {
        owner: Owner,
        namespace: String,
        needed: usize,
        ceiling: usize,
    },

    #[error("host transaction failed: {0}")]
    HostTransactionFailure(#[source] HostError),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(CodecError),

    #[error(transparent)]
    Host(HostError),
}

impl StoreError {
    /// Errors that spoil one entity's record but not the document: a batch
    /// pass reports them and moves on to the next entity.
    pub fn is_entity_local(&self) -> bool {
        matches!(
            self,
            StoreError::CorruptPayload { .. } | StoreError::ChunkCeilingExceeded { .. }
        )
    }

    pub(crate) fn corrupt(owner: Owner, namespace: &str, reason: impl Into<String>) -> Self {
        StoreError::CorruptPayload {
            owner,
            namespace: namespace.to_string(),
            reason: reason.into(),
        }
    }

    /// Attaches owner and namespace context to a codec failure.
    pub(crate) fn from_codec(err: CodecError, owner: Owner, namespace: &str) -> Self {
        match err {
            CodecError::Corrupt(reason) => Self::corrupt(owner, namespace, reason),
            CodecError::Empty => Self::corrupt(owner, namespace, "no chunks"),
            CodecError::CeilingExceeded { needed, ceiling } => StoreError::ChunkCeilingExceeded {
                owner,
                namespace: namespace.to_string(),
                needed,
                ceiling,
            },
            CodecError::Serialize(e) => StoreError::Serialize(e),
            other => StoreError::Codec(other),
        }
    }
}

impl From<HostError> for StoreError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Unregistered(ns) => StoreError::NamespaceNotRegistered(ns),
            HostError::CommitFailed(_) => StoreError::HostTransactionFailure(err),
            other => StoreError::Host(other),
        }
    }
}
