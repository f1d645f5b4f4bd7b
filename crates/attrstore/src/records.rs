//! Record shapes the takeoff plugin keeps in a drawing.
//!
//! The stores persist whatever JSON they are handed; these types exist so
//! callers do not have to build that JSON by hand. Fields this crate does not
//! know about are kept in `extra` and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use slotstore::{EntityId, Owner, SlotStore, Value};

use crate::document::{RecordError, SlotRecord};
use crate::error::Result;
use crate::registry;

/// Marks an entity as a takeoff component; holds the component type.
pub const COMPONENT_MARKER: &str = "METALCOMP";
/// Base namespace of a component's part-list chunk set.
pub const PARTS_NAMESPACE: &str = "METALPARTS";
/// Document key of the drawing's work point.
pub const WORK_POINT_KEY: &str = "METALWORKPOINT";
/// Document key of the drawing's elevation definitions.
pub const ELEVATIONS_KEY: &str = "METALELEVATIONS";

/// Metal parts attached to one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartList {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    #[serde(rename = "len")]
    pub length: f64,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl Part {
    pub fn new(id: impl Into<String>, length: f64) -> Self {
        Self {
            id: id.into(),
            length,
            extra: Map::new(),
        }
    }
}

/// Drawing origin used when measuring elevations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SlotRecord for WorkPoint {
    fn to_slot(&self) -> std::result::Result<Vec<Value>, RecordError> {
        Ok(vec![Value::Real(self.x), Value::Real(self.y), Value::Real(self.z)])
    }

    fn from_slot(values: &[Value]) -> std::result::Result<Self, RecordError> {
        match values {
            [Value::Real(x), Value::Real(y), Value::Real(z)] => Ok(WorkPoint {
                x: *x,
                y: *y,
                z: *z,
            }),
            _ => Err(RecordError::Shape(format!(
                "expected three reals, found {} values",
                values.len()
            ))),
        }
    }
}

/// A named elevation line of the drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationDefinition {
    pub name: String,
    pub elevation: f64,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl ElevationDefinition {
    pub fn new(name: impl Into<String>, elevation: f64) -> Self {
        Self {
            name: name.into(),
            elevation,
            extra: Map::new(),
        }
    }
}

/// Marks `entity` as a component of the given type.
pub fn mark_component(store: &mut dyn SlotStore, entity: EntityId, kind: &str) -> Result<()> {
    registry::ensure(store, COMPONENT_MARKER)?;
    store.set_slot(
        Owner::Entity(entity),
        COMPONENT_MARKER,
        vec![Value::Text(kind.to_string())],
    )?;
    Ok(())
}

/// The component type of `entity`, if it is marked as one.
pub fn component_kind(store: &dyn SlotStore, entity: EntityId) -> Result<Option<String>> {
    let slot = store.get_slot(Owner::Entity(entity), COMPONENT_MARKER)?;
    Ok(slot.and_then(|values| values.first().and_then(|v| v.as_text().map(str::to_string))))
}
