use std::collections::{BTreeMap, BTreeSet};

use crate::{
    slot_size, validate_namespace, EntityId, Host, HostError, Owner, Slot, SlotStore,
};

/// Per-slot capacity of a [`Drawing`] unless configured otherwise.
pub const DEFAULT_SLOT_CAPACITY: usize = 16 * 1024;

type SlotKey = (Owner, String);

/// An in-memory drawing: namespace table, entity handles and slots.
///
/// Slot access goes through [`Host::transaction`]. Mutations made inside a
/// unit of work are staged in an overlay (reads see them immediately) and only
/// applied to the drawing when the unit commits.
#[derive(Debug, Clone)]
pub struct Drawing {
    namespaces: BTreeSet<String>,
    entities: BTreeSet<EntityId>,
    slots: BTreeMap<SlotKey, Slot>,
    next_handle: u64,
    slot_capacity: usize,
    #[cfg(any(test, feature = "fault-injection"))]
    failing_commits: usize,
}

impl Drawing {
    /// Creates an empty drawing with [`DEFAULT_SLOT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_slot_capacity(DEFAULT_SLOT_CAPACITY)
    }

    /// Creates an empty drawing whose slots hold at most `capacity` bytes.
    pub fn with_slot_capacity(capacity: usize) -> Self {
        Self {
            namespaces: BTreeSet::new(),
            entities: BTreeSet::new(),
            slots: BTreeMap::new(),
            next_handle: 1,
            slot_capacity: capacity,
            #[cfg(any(test, feature = "fault-injection"))]
            failing_commits: 0,
        }
    }

    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Adds a new entity and returns its handle.
    pub fn add_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_handle);
        self.next_handle += 1;
        self.entities.insert(id);
        id
    }

    /// Re-creates an entity with a known handle (used when loading a drawing).
    ///
    /// Later calls to [`add_entity`](Drawing::add_entity) never hand out a
    /// handle at or below the largest restored one.
    pub fn restore_entity(&mut self, id: EntityId) {
        self.entities.insert(id);
        self.next_handle = self.next_handle.max(id.0.saturating_add(1));
    }

    /// Erases an entity together with every slot attached to it.
    ///
    /// Returns `false` if the handle did not exist.
    pub fn erase_entity(&mut self, id: EntityId) -> bool {
        if !self.entities.remove(&id) {
            return false;
        }
        self.slots
            .retain(|(owner, _), _| *owner != Owner::Entity(id));
        true
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Entity handles in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Registered namespaces in ascending order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// All populated slots, ordered by owner then namespace.
    pub fn slots(&self) -> impl Iterator<Item = (Owner, &str, &Slot)> {
        self.slots
            .iter()
            .map(|((owner, ns), values)| (*owner, ns.as_str(), values))
    }

    /// Number of populated slots across the whole drawing.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Makes the next `count` commits fail with [`HostError::CommitFailed`].
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn fail_next_commits(&mut self, count: usize) {
        self.failing_commits = count;
    }

    fn commit(
        &mut self,
        namespaces: BTreeSet<String>,
        writes: BTreeMap<SlotKey, Slot>,
    ) -> Result<(), HostError> {
        #[cfg(any(test, feature = "fault-injection"))]
        {
            if self.failing_commits > 0 {
                self.failing_commits -= 1;
                return Err(HostError::CommitFailed("injected fault".to_string()));
            }
        }

        self.namespaces.extend(namespaces);
        for (key, values) in writes {
            if values.is_empty() {
                self.slots.remove(&key);
            } else {
                self.slots.insert(key, values);
            }
        }
        Ok(())
    }
}

impl Default for Drawing {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for Drawing {
    fn transaction<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        E: From<HostError>,
        F: FnOnce(&mut dyn SlotStore) -> Result<T, E>,
    {
        let mut staged = Staged::new(self);
        let out = work(&mut staged)?;
        let Staged {
            namespaces, writes, ..
        } = staged;
        self.commit(namespaces, writes)?;
        Ok(out)
    }
}

/// Uncommitted view of a drawing: staged writes shadow committed slots.
struct Staged<'a> {
    base: &'a Drawing,
    namespaces: BTreeSet<String>,
    /// An empty slot here is a pending clear.
    writes: BTreeMap<SlotKey, Slot>,
}

impl<'a> Staged<'a> {
    fn new(base: &'a Drawing) -> Self {
        Self {
            base,
            namespaces: BTreeSet::new(),
            writes: BTreeMap::new(),
        }
    }

    fn check_owner(&self, owner: Owner) -> Result<(), HostError> {
        match owner {
            Owner::Entity(id) if !self.base.contains_entity(id) => Err(HostError::NoSuchEntity(id)),
            _ => Ok(()),
        }
    }
}

impl SlotStore for Staged<'_> {
    fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.contains(name) || self.base.namespaces.contains(name)
    }

    fn register_namespace(&mut self, name: &str) -> Result<(), HostError> {
        validate_namespace(name)?;
        if !self.namespace_exists(name) {
            self.namespaces.insert(name.to_string());
        }
        Ok(())
    }

    fn get_slot(&self, owner: Owner, namespace: &str) -> Result<Option<Slot>, HostError> {
        self.check_owner(owner)?;
        if !self.namespace_exists(namespace) {
            return Ok(None);
        }

        let key = (owner, namespace.to_string());
        // staged writes first, then the committed drawing
        if let Some(values) = self.writes.get(&key) {
            return Ok((!values.is_empty()).then(|| values.clone()));
        }
        Ok(self.base.slots.get(&key).cloned())
    }

    fn set_slot(&mut self, owner: Owner, namespace: &str, values: Slot) -> Result<(), HostError> {
        self.check_owner(owner)?;
        if !self.namespace_exists(namespace) {
            return Err(HostError::Unregistered(namespace.to_string()));
        }

        let size = slot_size(&values);
        if size > self.base.slot_capacity {
            return Err(HostError::SlotTooLarge {
                owner,
                namespace: namespace.to_string(),
                size,
                capacity: self.base.slot_capacity,
            });
        }

        self.writes.insert((owner, namespace.to_string()), values);
        Ok(())
    }

    fn entities_with(&self, namespace: &str) -> Result<Vec<EntityId>, HostError> {
        let mut found = Vec::new();
        for id in self.base.entities() {
            if self.get_slot(Owner::Entity(id), namespace)?.is_some() {
                found.push(id);
            }
        }
        Ok(found)
    }
}
