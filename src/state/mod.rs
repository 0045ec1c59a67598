//! Local record of the remote ids this tool has created.
//!
//! An id is written the moment the backend hands it out, before any wait, so
//! an interrupted or timed-out run can resume instead of creating a second
//! copy of the resource.

mod record;
mod store;

pub use record::{ResourceKind, ResourceRecord};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
