//! Provider cache abstraction.
//!
//! The engine consults a `TorrentProviderCache` before issuing a live
//! provider request and stores non-empty results afterwards. Cache failures
//! are logged and treated as misses; they never fail a search.

mod memory;
mod traits;

pub use memory::MemoryProviderCache;
pub use traits::{CacheError, TorrentProviderCache};
