//! Batch reconciliation: re-chunk every component of a drawing.
//!
//! The pass registers the full chunk layout once, lists the entities carrying
//! the component marker, then rewrites each entity's chunk set under the
//! target codec in its own unit of work. A corrupt or oversized record only
//! costs that entity: it is rolled back, reported and skipped. A host commit
//! failure stops the pass.
//!
//! Per entity:
//!
//! ```text
//! Unvisited -> Read -> Decoded -> Rewritten -> Reconciled
//!                \         \
//!                 `---------`-> DecodeFailed -> Skipped
//! ```
//!
//! A record that decodes but no longer fits the target ceiling fails from
//! `Decoded`.

use std::fmt;

use chunkcodec::ChunkCodec;
use slotstore::{EntityId, Host, Owner, SlotStore};
use tracing::{info, trace, warn};

use crate::config::{ConfigError, StoreConfig};
use crate::entity::EntityAttributeStore;
use crate::error::{Result, StoreError};
use crate::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Unvisited,
    Read,
    Decoded,
    Rewritten,
    Reconciled,
    DecodeFailed,
    Skipped,
}

impl EntityState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntityState::Reconciled | EntityState::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntity {
    pub entity: EntityId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Namespaces newly registered by the pass.
    pub registered: usize,
    pub reconciled: Vec<EntityId>,
    pub skipped: Vec<SkippedEntity>,
}

impl ReconcileReport {
    pub fn visited(&self) -> usize {
        self.reconciled.len() + self.skipped.len()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reconciled {}, skipped {}",
            self.reconciled.len(),
            self.skipped.len()
        )?;
        for skip in &self.skipped {
            write!(f, "\n  skipped {}: {}", skip.entity, skip.reason)?;
        }
        Ok(())
    }
}

/// Rewrites chunk sets under `base` for every entity marked with `marker`.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: EntityAttributeStore,
    base: String,
    marker: String,
}

impl Reconciler {
    /// `codec` holds the target parameters; existing chunk sets are read
    /// whatever chunk size they were written with.
    pub fn new(codec: ChunkCodec, base: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            store: EntityAttributeStore::new(codec),
            base: base.into(),
            marker: marker.into(),
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> std::result::Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::new(
            cfg.codec()?,
            cfg.parts_namespace.clone(),
            cfg.component_marker.clone(),
        ))
    }

    pub fn run<H: Host>(&self, host: &mut H) -> Result<ReconcileReport> {
        let ceiling = self.store.codec().ceiling();
        let mut report = ReconcileReport {
            registered: registry::preregister(host, &self.base, ceiling)?,
            ..ReconcileReport::default()
        };

        let marker = self.marker.as_str();
        let entities =
            host.transaction(|tx| tx.entities_with(marker).map_err(StoreError::from))?;
        info!(
            namespace = %self.base,
            marker,
            entities = entities.len(),
            chunk_size = self.store.codec().chunk_size(),
            ceiling,
            "reconciling chunk sets"
        );

        for entity in entities {
            let mut walk = Walk::new(entity);
            match host.transaction(|tx| self.reconcile_entity(tx, &mut walk)) {
                Ok(state) => {
                    debug_assert_eq!(state, EntityState::Reconciled);
                    report.reconciled.push(entity);
                }
                Err(err) if err.is_entity_local() => {
                    walk.step(EntityState::Skipped);
                    warn!(
                        entity = %entity,
                        states = ?walk.trail,
                        error = %err,
                        "skipping entity"
                    );
                    report.skipped.push(SkippedEntity {
                        entity,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            reconciled = report.reconciled.len(),
            skipped = report.skipped.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    fn reconcile_entity(&self, tx: &mut dyn SlotStore, walk: &mut Walk) -> Result<EntityState> {
        let entity = walk.entity;

        let chunks = self.store.read_chunks(tx, entity, &self.base);
        walk.step(EntityState::Read);
        let chunks = match chunks {
            Ok(chunks) => chunks,
            Err(err) => return Err(walk.fail(err)),
        };

        let Some(chunks) = chunks else {
            // marked component without parts: only sweep stale chunks
            self.store.reclaim_orphans(tx, entity, &self.base)?;
            return Ok(walk.step(EntityState::Reconciled));
        };

        let text = match ChunkCodec::join(&chunks) {
            Ok(text) => text,
            Err(err) => {
                return Err(walk.fail(StoreError::from_codec(err, Owner::Entity(entity), &self.base)))
            }
        };
        walk.step(EntityState::Decoded);

        if let Err(err) = self.store.write_text(tx, entity, &self.base, &text) {
            return Err(walk.fail(err));
        }
        walk.step(EntityState::Rewritten);

        Ok(walk.step(EntityState::Reconciled))
    }
}

/// One entity's way through the pass.
#[derive(Debug)]
struct Walk {
    entity: EntityId,
    state: EntityState,
    /// States entered, in order.
    trail: Vec<EntityState>,
}

impl Walk {
    fn new(entity: EntityId) -> Self {
        Self {
            entity,
            state: EntityState::Unvisited,
            trail: Vec::new(),
        }
    }

    fn step(&mut self, to: EntityState) -> EntityState {
        let from = self.state;
        debug_assert!(!from.is_terminal(), "{} left terminal state {from:?}", self.entity);
        trace!(entity = %self.entity, ?from, ?to, "reconcile step");
        self.state = to;
        self.trail.push(to);
        to
    }

    /// Entity-local errors move the walk to `DecodeFailed`; host errors pass
    /// through untouched.
    fn fail(&mut self, err: StoreError) -> StoreError {
        if err.is_entity_local() {
            self.step(EntityState::DecodeFailed);
        }
        err
    }
}
