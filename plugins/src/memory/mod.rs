pub mod local;

pub use local::{LocalMemoryStore, MemoryEntry};
