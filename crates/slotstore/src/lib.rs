//! # Slotstore
//!
//! The host record store as seen by the takeoff metadata layer.
//!
//! A CAD host lets applications attach small, typed records to drawing
//! entities and to the drawing itself. Every record lives in a **slot**
//! addressed by `(owner, namespace)`, where the namespace must first be
//! registered in a drawing-wide namespace table. Slots are small and bounded,
//! which is why larger payloads are chunked by the layers above.
//!
//! This crate models that surface with two traits:
//!
//! - [`SlotStore`]: the four slot operations (plus entity enumeration).
//! - [`Host`]: scoped units of work. Everything done inside
//!   [`Host::transaction`] is committed together or discarded together.
//!
//! [`Drawing`] is an in-memory host implementing both, used by tests, the
//! snapshot file format and the maintenance tool.
//!
//! ## Example
//! ```rust
//! use slotstore::{Drawing, Host, HostError, Owner, SlotStore, Value};
//!
//! let mut dwg = Drawing::new();
//! let door = dwg.add_entity();
//! dwg.transaction(|tx| -> Result<(), HostError> {
//!     tx.register_namespace("METALCOMP")?;
//!     tx.set_slot(Owner::Entity(door), "METALCOMP", vec![Value::Text("door".into())])
//! })
//! .unwrap();
//!
//! let slot = dwg
//!     .transaction(|tx| tx.get_slot(Owner::Entity(door), "METALCOMP"))
//!     .unwrap();
//! assert_eq!(slot, Some(vec![Value::Text("door".into())]));
//! ```

mod drawing;

use std::fmt;

use thiserror::Error;

pub use drawing::{Drawing, DEFAULT_SLOT_CAPACITY};

/// Longest namespace name the host accepts.
pub const MAX_NAMESPACE_LEN: usize = 64;

/// Handle of a drawing entity.
///
/// Handles are assigned by the host, never reused within a drawing, and
/// printed in hexadecimal the way CAD hosts show them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// What a slot is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner {
    /// The drawing-level dictionary.
    Document,
    /// A single drawing entity.
    Entity(EntityId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Document => f.write_str("document"),
            Owner::Entity(id) => write!(f, "entity {id}"),
        }
    }
}

/// One typed value inside a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Bytes this value counts against a slot's capacity.
    ///
    /// Numbers are fixed width; text carries a two byte length prefix.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Int(_) | Value::Real(_) => 8,
            Value::Text(s) => 2 + s.len(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// The ordered values held by one slot. An empty slot is a cleared slot.
pub type Slot = Vec<Value>;

/// Total encoded size of a slot's values.
pub fn slot_size(values: &[Value]) -> usize {
    values.iter().map(Value::encoded_len).sum()
}

/// Errors raised by the host record store.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("namespace {0:?} is not registered")]
    Unregistered(String),
    #[error("invalid namespace name {0:?}")]
    InvalidNamespace(String),
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
    #[error("slot {namespace:?} on {owner} is {size} bytes, capacity is {capacity}")]
    SlotTooLarge {
        owner: Owner,
        namespace: String,
        size: usize,
        capacity: usize,
    },
    #[error("unit of work failed to commit: {0}")]
    CommitFailed(String),
}

/// Checks that `name` is a namespace the host accepts.
pub fn validate_namespace(name: &str) -> Result<(), HostError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAMESPACE_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(HostError::InvalidNamespace(name.to_string()))
    }
}

/// Named, typed, size-bounded slots per entity and per document.
///
/// Reads never fail because a namespace is unknown: a slot under an
/// unregistered namespace simply does not exist. Writes require the
/// namespace to be registered first.
pub trait SlotStore {
    /// Returns `true` if `name` is in the drawing's namespace table.
    fn namespace_exists(&self, name: &str) -> bool;

    /// Adds `name` to the namespace table. Registering twice is a no-op.
    fn register_namespace(&mut self, name: &str) -> Result<(), HostError>;

    /// Returns the populated slot at `(owner, namespace)`, or `None` when the
    /// slot was never written, was cleared, or its namespace is unregistered.
    fn get_slot(&self, owner: Owner, namespace: &str) -> Result<Option<Slot>, HostError>;

    /// Replaces the slot at `(owner, namespace)`. An empty `values` clears the
    /// slot without touching the namespace table.
    fn set_slot(&mut self, owner: Owner, namespace: &str, values: Slot) -> Result<(), HostError>;

    /// Entities holding a populated slot under `namespace`, in handle order.
    fn entities_with(&self, namespace: &str) -> Result<Vec<EntityId>, HostError>;
}

/// A document that scopes slot access in units of work.
pub trait Host {
    /// Runs `work` inside one unit of work.
    ///
    /// If `work` returns `Ok` the staged mutations are committed; a failed
    /// commit surfaces as `E::from(HostError::CommitFailed(..))` and leaves
    /// the document as it was. If `work` returns `Err` every staged mutation
    /// is discarded.
    fn transaction<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        E: From<HostError>,
        F: FnOnce(&mut dyn SlotStore) -> Result<T, E>;
}
