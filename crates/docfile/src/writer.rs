use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use slotstore::{Drawing, Owner, Value};
use std::fs::{rename, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::format::{
    write_str, write_trailer, OWNER_DOCUMENT, OWNER_ENTITY, SNAPSHOT_MAGIC, VALUE_INT, VALUE_REAL,
    VALUE_TEXT,
};

/// Writes a [`Drawing`] to disk as a snapshot file.
///
/// Stateless, like the reader: all work happens in
/// [`write_drawing`](SnapshotWriter::write_drawing).
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Saves `dwg` to `path`.
    ///
    /// # Body layout
    ///
    /// ```text
    /// slot_capacity(u64)
    /// ns_count(u32)     repeated: name_len(u32) | name
    /// entity_count(u32) repeated: handle(u64)
    /// slot_count(u32)   repeated: owner_tag(u8) | [handle(u64)] | name_len(u32) | name
    ///                             | value_count(u32) | values
    /// value:            tag(u8) | i64 | f64 | text_len(u32) text
    /// ```
    ///
    /// # Crash Safety
    ///
    /// Writes to `path.tmp`, calls `sync_all()`, then renames over `path`. A
    /// crash mid-write leaves the previous snapshot in place.
    pub fn write_drawing(path: &Path, dwg: &Drawing) -> Result<()> {
        let body = encode_body(dwg)?;

        let tmp_path = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_u32::<LittleEndian>(SNAPSHOT_MAGIC)?;
        file.write_all(&body)?;
        write_trailer(&mut file, &body)?;

        file.flush()?;
        file.sync_all()?;
        rename(tmp_path, path)?;
        Ok(())
    }
}

fn encode_body(dwg: &Drawing) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.write_u64::<LittleEndian>(dwg.slot_capacity() as u64)?;

    let namespaces: Vec<&str> = dwg.namespaces().collect();
    body.write_u32::<LittleEndian>(namespaces.len() as u32)?;
    for ns in namespaces {
        write_str(&mut body, ns)?;
    }

    let entities: Vec<_> = dwg.entities().collect();
    body.write_u32::<LittleEndian>(entities.len() as u32)?;
    for id in entities {
        body.write_u64::<LittleEndian>(id.0)?;
    }

    body.write_u32::<LittleEndian>(dwg.slot_count() as u32)?;
    for (owner, ns, values) in dwg.slots() {
        match owner {
            Owner::Document => body.write_u8(OWNER_DOCUMENT)?,
            Owner::Entity(id) => {
                body.write_u8(OWNER_ENTITY)?;
                body.write_u64::<LittleEndian>(id.0)?;
            }
        }
        write_str(&mut body, ns)?;

        body.write_u32::<LittleEndian>(values.len() as u32)?;
        for value in values {
            match value {
                Value::Int(n) => {
                    body.write_u8(VALUE_INT)?;
                    body.write_i64::<LittleEndian>(*n)?;
                }
                Value::Real(x) => {
                    body.write_u8(VALUE_REAL)?;
                    body.write_f64::<LittleEndian>(*x)?;
                }
                Value::Text(s) => {
                    body.write_u8(VALUE_TEXT)?;
                    write_str(&mut body, s)?;
                }
            }
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FRAME_BYTES;
    use byteorder::ReadBytesExt;
    use slotstore::{Host, HostError};
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::tempdir;

    #[test]
    fn write_and_inspect_framing() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plan.xdw");

        let mut dwg = Drawing::new();
        let e = dwg.add_entity();
        dwg.transaction(|tx| -> std::result::Result<(), HostError> {
            tx.register_namespace("METALCOMP")?;
            tx.set_slot(Owner::Entity(e), "METALCOMP", vec![Value::Text("door".into())])
        })?;
        SnapshotWriter::write_drawing(&path, &dwg)?;

        let mut f = std::fs::File::open(&path)?;
        let filesize = f.metadata()?.len();
        assert!(filesize > FRAME_BYTES);
        assert_eq!(f.read_u32::<LittleEndian>()?, SNAPSHOT_MAGIC);

        f.seek(SeekFrom::End(-4))?;
        assert_eq!(f.read_u32::<LittleEndian>()?, SNAPSHOT_MAGIC);

        // no temp file is left behind
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn rewrite_replaces_previous_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plan.xdw");

        let mut dwg = Drawing::new();
        SnapshotWriter::write_drawing(&path, &dwg)?;
        let empty_len = std::fs::metadata(&path)?.len();

        dwg.add_entity();
        SnapshotWriter::write_drawing(&path, &dwg)?;
        let mut bytes = Vec::new();
        std::fs::File::open(&path)?.read_to_end(&mut bytes)?;
        assert_eq!(bytes.len() as u64, empty_len + 8);
        Ok(())
    }
}
