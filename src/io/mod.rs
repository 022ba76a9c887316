pub mod config_io;
pub mod fs_store;
pub mod index;
pub mod store;

pub use fs_store::FsStore;
pub use index::{ExternalIndex, IndexError, IndexHit, LocalIndex, NoIndex};
pub use store::{MemoryStore, NoteStore, StoreError};
