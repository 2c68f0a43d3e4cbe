//! File input/output: persisted maps, session naming, dataset replay.

pub mod euroc;
pub mod map_file;
pub mod naming;

pub use map_file::{MapExporter, MapLoader, PersistedMap, write_map};
