//! Multi-provider torrent search.
//!
//! A `TorrentSearch` fans one query out to every enabled provider and
//! exposes the merged results through a `SearchResult`, with caching,
//! pagination and per-provider failure isolation.

pub mod cache;
pub mod config;
pub mod provider;
pub mod search;
pub mod testing;
pub mod torrent_search;
pub mod transport;

pub use cache::{CacheError, MemoryProviderCache, TorrentProviderCache};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use provider::{Credentials, ProviderError, TorrentProvider};
pub use search::{
    Category, ProviderFailure, ProviderResult, ProviderSuccess, ResolveFailure, ResolveResult,
    ResolveResultSet, SearchParam, SearchResult, TorrentDescription, TorrentQuery,
};
pub use torrent_search::{TorrentSearch, TorrentSearchError};
pub use transport::{HttpTransport, TransportError};
