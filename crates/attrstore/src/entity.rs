//! Entity attribute store: chunk sets attached to single entities.
//!
//! # Write Path
//!
//! 1. Encode the record into chunks (fails before touching any slot if the
//!    record needs more chunks than the ceiling).
//! 2. Ensure the base, info and chunk `0..ceiling` namespaces are registered.
//! 3. Overwrite the info slot with the chunk count.
//! 4. Overwrite chunk slots `0..count`.
//! 5. Clear every populated chunk slot at or above the new count (orphans).
//!
//! # Read Path
//!
//! 1. No info slot (or a zero count) means no record. A count beyond the
//!    registered chunk slots is a corrupt payload.
//! 2. Read chunk slots `0..count` in order; a gap is a corrupt payload.
//! 3. Join and parse.
//!
//! Both paths take the unit of work they run in as a `&mut dyn SlotStore`, so a
//! failure anywhere in a write discards the whole write. The `save` / `load`
//! wrappers open that unit of work themselves.

use chunkcodec::{chunk_namespace, info_namespace, ChunkCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotstore::{EntityId, Host, Owner, SlotStore, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::registry;

/// What a write did to the chunk set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Chunk count now stored in the info slot.
    pub chunk_count: usize,
    /// Indices of orphan chunk slots that were cleared.
    pub reclaimed: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityAttributeStore {
    codec: ChunkCodec,
}

impl EntityAttributeStore {
    pub fn new(codec: ChunkCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> ChunkCodec {
        self.codec
    }

    /// Serializes `record` and replaces the chunk set under `base`.
    pub fn write<T: Serialize + ?Sized>(
        &self,
        store: &mut dyn SlotStore,
        entity: EntityId,
        base: &str,
        record: &T,
    ) -> Result<WriteOutcome> {
        let chunks = self
            .codec
            .encode(record)
            .map_err(|e| StoreError::from_codec(e, Owner::Entity(entity), base))?;
        self.write_chunks(store, entity, base, &chunks)
    }

    /// Replaces the chunk set under `base` with already-serialized JSON.
    ///
    /// Empty text removes the record, like [`clear`](Self::clear).
    pub fn write_text(
        &self,
        store: &mut dyn SlotStore,
        entity: EntityId,
        base: &str,
        text: &str,
    ) -> Result<WriteOutcome> {
        let chunks = self
            .codec
            .split(text)
            .map_err(|e| StoreError::from_codec(e, Owner::Entity(entity), base))?;
        self.write_chunks(store, entity, base, &chunks)
    }

    /// Removes the record: count 0, every chunk slot cleared. Namespaces stay
    /// registered.
    pub fn clear(
        &self,
        store: &mut dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<WriteOutcome> {
        self.write_chunks(store, entity, base, &[])
    }

    fn write_chunks(
        &self,
        store: &mut dyn SlotStore,
        entity: EntityId,
        base: &str,
        chunks: &[String],
    ) -> Result<WriteOutcome> {
        let owner = Owner::Entity(entity);
        let info = info_namespace(base);
        registry::ensure_layout(store, base, self.codec.ceiling())?;

        let bound = self.extent(store, base);
        // a malformed old header must not block overwriting it
        let previous = read_count(store, owner, base, bound).ok().flatten().unwrap_or(0);

        store.set_slot(owner, &info, vec![Value::Int(chunks.len() as i64)])?;
        for (i, chunk) in chunks.iter().enumerate() {
            store.set_slot(
                owner,
                &chunk_namespace(base, i),
                vec![Value::Text(chunk.clone())],
            )?;
        }

        let reclaimed = reclaim(store, owner, base, chunks.len(), bound)?;

        debug!(
            entity = %entity,
            namespace = base,
            chunks = chunks.len(),
            previous,
            reclaimed = reclaimed.len(),
            "wrote chunk set"
        );
        Ok(WriteOutcome {
            chunk_count: chunks.len(),
            reclaimed,
        })
    }

    /// Clears orphan chunk slots above the stored count without rewriting the
    /// record. Returns the cleared indices.
    pub fn reclaim_orphans(
        &self,
        store: &mut dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<Vec<usize>> {
        let owner = Owner::Entity(entity);
        let bound = self.extent(store, base);
        let count = read_count(store, owner, base, bound)?.unwrap_or(0);
        reclaim(store, owner, base, count, bound)
    }

    /// The stored record as JSON text, exactly as it was written.
    pub fn read_text(
        &self,
        store: &dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<Option<String>> {
        let Some(chunks) = self.read_chunks(store, entity, base)? else {
            return Ok(None);
        };
        ChunkCodec::join(&chunks)
            .map(Some)
            .map_err(|e| StoreError::from_codec(e, Owner::Entity(entity), base))
    }

    pub fn read<T: DeserializeOwned>(
        &self,
        store: &dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<Option<T>> {
        let Some(chunks) = self.read_chunks(store, entity, base)? else {
            return Ok(None);
        };
        ChunkCodec::decode(&chunks)
            .map(Some)
            .map_err(|e| StoreError::from_codec(e, Owner::Entity(entity), base))
    }

    /// Chunk count in the info slot; `None` when there is no info slot.
    pub fn chunk_count(
        &self,
        store: &dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<Option<usize>> {
        read_count(store, Owner::Entity(entity), base, self.extent(store, base))
    }

    /// Raw chunks `0..count` in index order, or `None` when there is no record.
    pub(crate) fn read_chunks(
        &self,
        store: &dyn SlotStore,
        entity: EntityId,
        base: &str,
    ) -> Result<Option<Vec<String>>> {
        let owner = Owner::Entity(entity);
        let count = match read_count(store, owner, base, self.extent(store, base))? {
            None | Some(0) => return Ok(None),
            Some(n) => n,
        };

        let mut chunks = Vec::new();
        for i in 0..count {
            let ns = chunk_namespace(base, i);
            match store.get_slot(owner, &ns)?.as_deref() {
                Some([Value::Text(text)]) if !text.is_empty() => chunks.push(text.clone()),
                Some(_) => {
                    return Err(StoreError::corrupt(owner, base, format!("chunk {i} is malformed")))
                }
                None => {
                    return Err(StoreError::corrupt(
                        owner,
                        base,
                        format!("chunk {i} of {count} is missing"),
                    ))
                }
            }
        }
        Ok(Some(chunks))
    }

    /// [`write`](Self::write) in its own unit of work.
    pub fn save<H: Host, T: Serialize + ?Sized>(
        &self,
        host: &mut H,
        entity: EntityId,
        base: &str,
        record: &T,
    ) -> Result<WriteOutcome> {
        host.transaction(|tx| self.write(tx, entity, base, record))
    }

    /// [`read`](Self::read) in its own unit of work.
    pub fn load<H: Host, T: DeserializeOwned>(
        &self,
        host: &mut H,
        entity: EntityId,
        base: &str,
    ) -> Result<Option<T>> {
        host.transaction(|tx| self.read(tx, entity, base))
    }

    /// Number of chunk slots a record under `base` can occupy: the ceiling, or
    /// more when an earlier, higher ceiling registered a longer layout.
    fn extent(&self, store: &dyn SlotStore, base: &str) -> usize {
        let mut registered = 0;
        while store.namespace_exists(&chunk_namespace(base, registered)) {
            registered += 1;
        }
        self.codec.ceiling().max(registered)
    }
}

/// Chunk count in the info slot. Counts above `bound` are corrupt.
fn read_count(
    store: &dyn SlotStore,
    owner: Owner,
    base: &str,
    bound: usize,
) -> Result<Option<usize>> {
    let info = info_namespace(base);
    let n = match store.get_slot(owner, &info)?.as_deref() {
        None => return Ok(None),
        Some([Value::Int(n)]) => *n,
        Some(_) => return Err(StoreError::corrupt(owner, base, "malformed info slot")),
    };
    match usize::try_from(n) {
        Ok(count) if count <= bound => Ok(Some(count)),
        Ok(_) => Err(StoreError::corrupt(
            owner,
            base,
            format!("chunk count {n} exceeds {bound} chunk slots"),
        )),
        Err(_) => Err(StoreError::corrupt(owner, base, format!("negative chunk count {n}"))),
    }
}

/// Clears populated chunk slots `from..to` whose namespace is registered.
fn reclaim(
    store: &mut dyn SlotStore,
    owner: Owner,
    base: &str,
    from: usize,
    to: usize,
) -> Result<Vec<usize>> {
    let mut reclaimed = Vec::new();
    for j in from..to {
        let ns = chunk_namespace(base, j);
        if store.namespace_exists(&ns) && store.get_slot(owner, &ns)?.is_some() {
            store.set_slot(owner, &ns, Vec::new())?;
            reclaimed.push(j);
        }
    }
    Ok(reclaimed)
}
