//! Snapshot binary format constants and framing helpers.
//!
//! A snapshot file is framed as:
//!
//! ```text
//! [magic: u32 LE][body][crc32(body): u32 LE][magic: u32 LE]
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Write};

/// Magic number identifying snapshot v1 files (ASCII "XDW1").
pub const SNAPSHOT_MAGIC: u32 = 0x5844_5731;

/// Bytes of framing around the body: leading magic, checksum, trailing magic.
pub const FRAME_BYTES: u64 = 4 + 4 + 4;

/// Owner tags inside the body.
pub(crate) const OWNER_DOCUMENT: u8 = 0;
pub(crate) const OWNER_ENTITY: u8 = 1;

/// Value tags inside the body.
pub(crate) const VALUE_INT: u8 = 0;
pub(crate) const VALUE_REAL: u8 = 1;
pub(crate) const VALUE_TEXT: u8 = 2;

/// Writes the trailer (`crc32(body)` + magic) to `w`.
pub fn write_trailer<W: Write>(w: &mut W, body: &[u8]) -> IoResult<()> {
    w.write_u32::<LittleEndian>(crc32fast::hash(body))?;
    w.write_u32::<LittleEndian>(SNAPSHOT_MAGIC)?;
    Ok(())
}

/// Reads the trailer from `r`, returning `(checksum, magic)`.
pub fn read_trailer<R: Read>(r: &mut R) -> IoResult<(u32, u32)> {
    let checksum = r.read_u32::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;
    Ok((checksum, magic))
}

pub(crate) fn write_str<W: Write>(w: &mut W, s: &str) -> IoResult<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())
}

/// Reads a length-prefixed string. The buffer grows with the bytes actually
/// present, never with the stored length.
pub(crate) fn read_string<R: Read>(r: &mut R) -> anyhow::Result<String> {
    let len = r.read_u32::<LittleEndian>()?;
    let mut buf = Vec::new();
    r.take(u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() as u64 != u64::from(len) {
        anyhow::bail!("string of {len} bytes cut short after {}", buf.len());
    }
    Ok(String::from_utf8(buf)?)
}
