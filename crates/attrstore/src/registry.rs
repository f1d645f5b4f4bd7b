//! Namespace registration.
//!
//! Slots may only be written under namespaces present in the drawing's
//! namespace table. Two patterns keep that true:
//!
//! - just in time: [`ensure`] / [`ensure_layout`] inside the same unit of work
//!   as the write that depends on them;
//! - in bulk: [`preregister`] commits the whole chunk set layout once, before a
//!   batch pass starts touching entities.

use chunkcodec::layout_namespaces;
use slotstore::{Host, SlotStore};

use crate::error::Result;

/// Registers `name` if it is missing. Returns `true` if it was newly added.
pub fn ensure(store: &mut dyn SlotStore, name: &str) -> Result<bool> {
    if store.namespace_exists(name) {
        return Ok(false);
    }
    store.register_namespace(name)?;
    Ok(true)
}

pub fn exists(store: &dyn SlotStore, name: &str) -> bool {
    store.namespace_exists(name)
}

/// Ensures every name; returns how many were newly registered.
pub fn ensure_all<I, S>(store: &mut dyn SlotStore, names: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut added = 0;
    for name in names {
        if ensure(store, name.as_ref())? {
            added += 1;
        }
    }
    Ok(added)
}

/// Ensures the base, info and chunk `0..ceiling` namespaces of a chunk set.
pub fn ensure_layout(store: &mut dyn SlotStore, base: &str, ceiling: usize) -> Result<usize> {
    ensure_all(store, layout_namespaces(base, ceiling))
}

/// Registers a chunk set layout in its own unit of work.
pub fn preregister<H: Host>(host: &mut H, base: &str, ceiling: usize) -> Result<usize> {
    let added = host.transaction(|tx| ensure_layout(tx, base, ceiling))?;
    tracing::debug!(namespace = base, ceiling, added, "pre-registered chunk layout");
    Ok(added)
}
