//! Cache identity and coordination.
//!
//! This module owns everything about a cache entry except its bytes: the
//! [`CacheKey`] that names it, and the coordination-store state machine
//! around it (build lock, task id, throttle bookkeeping, pending flag).
//! The artifact bytes themselves are written only by the stream engine.

mod clock;
mod coordinator;
mod key;
mod kv;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{ExportCoordinator, DEFAULT_BOOKKEEPING_TTL, DEFAULT_LOCK_TTL};
pub use key::{CacheKey, EntityType, ExportFormat, KeyError};
pub use kv::{KvStore, MemoryKvStore};
