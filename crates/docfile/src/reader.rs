use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use slotstore::{Drawing, EntityId, Host, Owner, Slot, Value};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::format::{
    read_string, read_trailer, FRAME_BYTES, OWNER_DOCUMENT, OWNER_ENTITY, SNAPSHOT_MAGIC,
    VALUE_INT, VALUE_REAL, VALUE_TEXT,
};

/// Loads snapshot files back into [`Drawing`]s.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Reads the snapshot at `path`.
    ///
    /// # Validation
    ///
    /// - The file must be longer than the framing.
    /// - Both magics must equal `0x5844_5731` ("XDW1").
    /// - The body checksum must match.
    /// - The body must parse completely, and every slot must fit the stored
    ///   slot capacity and name a registered namespace and a listed entity.
    pub fn read_drawing<P: AsRef<Path>>(path: P) -> Result<Drawing> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::decode(&bytes).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    /// Parses a snapshot held in memory.
    pub fn decode(bytes: &[u8]) -> Result<Drawing> {
        if (bytes.len() as u64) <= FRAME_BYTES {
            bail!("snapshot too small");
        }

        let head = Cursor::new(bytes).read_u32::<LittleEndian>()?;
        if head != SNAPSHOT_MAGIC {
            bail!("invalid snapshot magic: {:x}", head);
        }

        let body_end = bytes.len() - 8;
        let body = &bytes[4..body_end];
        let (checksum, tail) = read_trailer(&mut Cursor::new(&bytes[body_end..]))?;
        if tail != SNAPSHOT_MAGIC {
            bail!("invalid snapshot trailer magic: {:x}", tail);
        }
        let actual = crc32fast::hash(body);
        if checksum != actual {
            bail!("snapshot checksum mismatch: stored {checksum:08x}, computed {actual:08x}");
        }

        decode_body(body)
    }
}

fn decode_body(body: &[u8]) -> Result<Drawing> {
    let mut r = Cursor::new(body);

    let capacity = usize::try_from(r.read_u64::<LittleEndian>()?)?;
    let mut dwg = Drawing::with_slot_capacity(capacity);

    let ns_count = read_count(&mut r, MIN_NAMESPACE_BYTES, "namespace")?;
    let mut namespaces = Vec::with_capacity(ns_count);
    for _ in 0..ns_count {
        namespaces.push(read_string(&mut r)?);
    }

    let entity_count = read_count(&mut r, ENTITY_BYTES, "entity")?;
    for _ in 0..entity_count {
        dwg.restore_entity(EntityId(r.read_u64::<LittleEndian>()?));
    }

    let slot_count = read_count(&mut r, MIN_SLOT_BYTES, "slot")?;
    let mut slots = Vec::with_capacity(slot_count);
    for _ in 0..slot_count {
        let owner = match r.read_u8()? {
            OWNER_DOCUMENT => Owner::Document,
            OWNER_ENTITY => Owner::Entity(EntityId(r.read_u64::<LittleEndian>()?)),
            tag => bail!("unknown owner tag {tag}"),
        };
        let ns = read_string(&mut r)?;
        let values = read_values(&mut r)?;
        if values.is_empty() {
            bail!("empty slot {ns} on {owner}");
        }
        slots.push((owner, ns, values));
    }

    if r.position() != body.len() as u64 {
        bail!("{} trailing bytes after slots", body.len() as u64 - r.position());
    }

    // replay through the host so capacity and ownership rules apply
    dwg.transaction(|tx| -> Result<()> {
        for ns in &namespaces {
            tx.register_namespace(ns)?;
        }
        for (owner, ns, values) in slots {
            tx.set_slot(owner, &ns, values)?;
        }
        Ok(())
    })?;
    Ok(dwg)
}

/// Smallest encodings: an empty name; a handle; a document slot with an empty
/// name and no values.
const MIN_NAMESPACE_BYTES: usize = 4;
const ENTITY_BYTES: usize = 8;
const MIN_SLOT_BYTES: usize = 1 + 4 + 4;

/// Reads a table length and checks the rest of the body can hold it.
fn read_count(r: &mut Cursor<&[u8]>, item_bytes: usize, what: &str) -> Result<usize> {
    let count = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len().saturating_sub(r.position() as usize);
    if count > remaining / item_bytes {
        bail!("{what} count {count} exceeds the {remaining} remaining body bytes");
    }
    Ok(count)
}

fn read_values<R: Read>(r: &mut R) -> Result<Slot> {
    let count = r.read_u32::<LittleEndian>()?;
    let mut values = Vec::new();
    for _ in 0..count {
        let value = match r.read_u8()? {
            VALUE_INT => Value::Int(r.read_i64::<LittleEndian>()?),
            VALUE_REAL => Value::Real(r.read_f64::<LittleEndian>()?),
            VALUE_TEXT => Value::Text(read_string(r)?),
            tag => bail!("unknown value tag {tag}"),
        };
        values.push(value);
    }
    Ok(values)
}
