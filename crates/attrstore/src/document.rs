//! Document attribute store.
//!
//! One slot per key, attached to the drawing itself. There is no chunking:
//! each record must fit a single slot, which holds for the work point (three
//! reals) and the elevation list (one JSON text value). The host rejects an
//! oversized slot with a `SlotTooLarge` error rather than truncating it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use slotstore::{Host, Owner, Slot, SlotStore, Value};
use thiserror::Error;

use crate::error::{Result, StoreError};
use crate::registry;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unexpected slot shape: {0}")]
    Shape(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A record that converts to and from the values of one slot.
pub trait SlotRecord: Sized {
    fn to_slot(&self) -> std::result::Result<Slot, RecordError>;
    fn from_slot(values: &[Value]) -> std::result::Result<Self, RecordError>;
}

/// Stores any serde type as a single JSON text value.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> SlotRecord for Json<T> {
    fn to_slot(&self) -> std::result::Result<Slot, RecordError> {
        Ok(vec![Value::Text(serde_json::to_string(&self.0)?)])
    }

    fn from_slot(values: &[Value]) -> std::result::Result<Self, RecordError> {
        match values {
            [Value::Text(text)] => Ok(Json(serde_json::from_str(text)?)),
            _ => Err(RecordError::Shape(
                "expected a single text value".to_string(),
            )),
        }
    }
}

fn encode<R: SlotRecord>(key: &str, record: &R) -> Result<Slot> {
    record.to_slot().map_err(|e| match e {
        RecordError::Json(e) => StoreError::Serialize(e),
        RecordError::Shape(reason) => StoreError::corrupt(Owner::Document, key, reason),
    })
}

/// Registers `key` if needed and replaces the document slot under it.
pub fn write<R: SlotRecord>(store: &mut dyn SlotStore, key: &str, record: &R) -> Result<()> {
    let values = encode(key, record)?;
    registry::ensure(store, key)?;
    store.set_slot(Owner::Document, key, values)?;
    tracing::debug!(namespace = key, "wrote document attribute");
    Ok(())
}

/// Reads the document slot under `key`. Never-written or unregistered keys
/// are absent.
pub fn read<R: SlotRecord>(store: &dyn SlotStore, key: &str) -> Result<Option<R>> {
    match store.get_slot(Owner::Document, key)? {
        None => Ok(None),
        Some(values) => R::from_slot(&values)
            .map(Some)
            .map_err(|e| StoreError::corrupt(Owner::Document, key, e.to_string())),
    }
}

/// Clears the document slot under `key`. Returns `true` if it held data.
pub fn clear(store: &mut dyn SlotStore, key: &str) -> Result<bool> {
    if !store.namespace_exists(key) || store.get_slot(Owner::Document, key)?.is_none() {
        return Ok(false);
    }
    store.set_slot(Owner::Document, key, Vec::new())?;
    Ok(true)
}

/// [`write`] in its own unit of work.
pub fn save<H: Host, R: SlotRecord>(host: &mut H, key: &str, record: &R) -> Result<()> {
    host.transaction(|tx| write(tx, key, record))
}

/// [`read`] in its own unit of work.
pub fn load<H: Host, R: SlotRecord>(host: &mut H, key: &str) -> Result<Option<R>> {
    host.transaction(|tx| read(tx, key))
}

/// Copies the document slot under `key` from `source` into `dest`.
///
/// The read and the write are two separate units of work, one per document,
/// so the copy is not atomic: if the destination write fails the source read
/// is simply lost and `dest` keeps its previous value. Returns `false` when
/// the source has nothing under `key` (the destination is left alone).
pub fn copy_between<S: Host, D: Host>(source: &mut S, dest: &mut D, key: &str) -> Result<bool> {
    let copied: Option<Slot> =
        source.transaction(|tx| tx.get_slot(Owner::Document, key).map_err(StoreError::from))?;
    let Some(values) = copied else {
        return Ok(false);
    };

    dest.transaction(|tx| -> Result<()> {
        registry::ensure(tx, key)?;
        tx.set_slot(Owner::Document, key, values)?;
        Ok(())
    })?;
    tracing::debug!(namespace = key, "copied document attribute");
    Ok(true)
}
