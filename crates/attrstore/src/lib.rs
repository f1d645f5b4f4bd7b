//! # Attrstore
//!
//! Typed metadata storage for the takeoff plugin, layered over the host's
//! namespaced slots.
//!
//! - [`EntityAttributeStore`]: one JSON record per `(entity, base namespace)`,
//!   persisted as a chunk set so it can outgrow a single slot.
//! - [`document`]: small records attached to the drawing itself, one slot per
//!   key, no chunking.
//! - [`registry`]: namespace registration, just in time or in bulk.
//! - [`Reconciler`]: a batch pass that rewrites every component's chunk set
//!   under new chunk parameters, skipping entities whose record is damaged.
//!
//! Every operation takes the unit of work it runs in; nothing here commits on
//! its own except the `save` / `load` / `preregister` / `run` entry points,
//! which open a [`Host::transaction`](slotstore::Host::transaction) themselves.
//!
//! ## Example
//! ```rust
//! use attrstore::{EntityAttributeStore, Part, PartList, PARTS_NAMESPACE};
//! use slotstore::Drawing;
//!
//! let mut dwg = Drawing::new();
//! let mullion = dwg.add_entity();
//! let store = EntityAttributeStore::default();
//!
//! let parts = PartList { parts: vec![Part::new("A1", 30.0)] };
//! store.save(&mut dwg, mullion, PARTS_NAMESPACE, &parts).unwrap();
//!
//! let back: Option<PartList> = store.load(&mut dwg, mullion, PARTS_NAMESPACE).unwrap();
//! assert_eq!(back, Some(parts));
//! ```

pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod records;
pub mod reconcile;
pub mod registry;

pub use config::{ConfigError, StoreConfig};
pub use document::{Json, RecordError, SlotRecord};
pub use entity::{EntityAttributeStore, WriteOutcome};
pub use error::{Result, StoreError};
pub use records::{
    component_kind, mark_component, ElevationDefinition, Part, PartList, WorkPoint,
    COMPONENT_MARKER, ELEVATIONS_KEY, PARTS_NAMESPACE, WORK_POINT_KEY,
};
pub use reconcile::{EntityState, ReconcileReport, Reconciler, SkippedEntity};
