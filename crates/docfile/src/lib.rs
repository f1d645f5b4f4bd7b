//! # Docfile
//!
//! Binary snapshot files for in-memory [`slotstore::Drawing`]s, so the
//! maintenance tool can load a drawing, run a pass over it and save it back.
//!
//! ## File layout (v1)
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ MAGIC (u32 LE) "XDW1"                         │
//! ├───────────────────────────────────────────────┤
//! │ BODY                                          │
//! │                                               │
//! │ slot_capacity (u64)                           │
//! │ namespace table   count (u32) | names         │
//! │ entity handles    count (u32) | u64 ...       │
//! │ populated slots   count (u32) | owner | name  │
//! │                   | tagged values             │
//! ├───────────────────────────────────────────────┤
//! │ TRAILER (always last 8 bytes)                 │
//! │                                               │
//! │ crc32(body) (u32 LE) | magic (u32 LE) "XDW1"  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian; strings are a `u32` byte length followed
//! by UTF-8. Loading replays the body through [`slotstore::Host`], so a file
//! can never produce a drawing the host itself would refuse.

mod format;
mod reader;
mod writer;

pub use format::{FRAME_BYTES, SNAPSHOT_MAGIC};
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;
