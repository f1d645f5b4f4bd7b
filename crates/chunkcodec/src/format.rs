//! Chunk set constants and namespace naming.

/// Default chunk size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of chunk slots a record may occupy.
pub const DEFAULT_CEILING: usize = 20;

/// Suffix of the namespace holding a chunk set's count.
pub const INFO_SUFFIX: &str = "INFO";

/// `METALPARTS` -> `METALPARTSINFO`
pub fn info_namespace(base: &str) -> String {
    format!("{base}{INFO_SUFFIX}")
}

/// `METALPARTS`, 3 -> `METALPARTS3`
pub fn chunk_namespace(base: &str, index: usize) -> String {
    format!("{base}{index}")
}

/// Every namespace a chunk set under `base` may use: the base itself, the
/// info namespace, then chunk indices `0..ceiling` in order.
pub fn layout_namespaces(base: &str, ceiling: usize) -> impl Iterator<Item = String> + '_ {
    [base.to_string(), info_namespace(base)]
        .into_iter()
        .chain((0..ceiling).map(move |i| chunk_namespace(base, i)))
}
