//! Session-scoped result cache.
//!
//! Results are kept in two layers:
//!
//! - an in-memory fast path holding the typed payload, shared by every
//!   orchestrator in the process
//! - a [`SessionStore`] holding a JSON copy, so a restarted client in the same
//!   session starts warm
//!
//! Freshness is checked lazily on read: an entry older than its TTL is removed
//! the moment somebody asks for it. There is no background sweeper and no size
//! bound.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResultCache::in_memory();
//! cache.set("teams", vec!["alpha".to_string()], Duration::from_secs(60));
//!
//! let entry = cache.get::<Vec<String>>("teams").expect("fresh");
//! assert_eq!(entry.payload, vec!["alpha".to_string()]);
//! ```

pub mod session;
pub mod store;

pub use session::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError};
pub use store::{CacheEntry, CacheStats, ResultCache};
