//! Search index synchronization
//!
//! ```text
//! DocumentStore ──ChangeEvent──▶ SearchSync ──project──▶ SearchIndex
//!                                    ▲
//!          POST /api/search/resync ──┘ (full scan + batched upsert)
//! ```

pub mod index;
pub mod projection;
pub mod sync;

pub use index::{MeiliSearchIndex, MemorySearchIndex, SearchIndex};
pub use projection::{flatten_timestamp, CollectionRecord, ComponentRecord, IndexKind, UserRecord};
pub use sync::{spawn_sync_task, ResyncReport, RetryPolicy, SearchSync};
