//! Testing utilities: a controllable provider and torrent fixtures.
//!
//! Used by the crate's own tests and by integration tests, without any
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use torrentsearch_core::testing::{fixtures, MockProvider};
//!
//! let provider = MockProvider::new("mock");
//! provider.set_torrents(vec![fixtures::big_buck_bunny("mock")]).await;
//!
//! let search = TorrentSearch::new(None, transport, false, vec![Arc::new(provider.clone())]);
//! ```

mod mock_provider;

pub use mock_provider::{MockProvider, RecordedQuery};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::search::TorrentDescription;

    /// Info hash of the Big Buck Bunny torrent seeded by webtorrent.io.
    pub const BIG_BUCK_BUNNY_HASH: &str = "dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c";

    /// Create a resolved test torrent with reasonable defaults.
    pub fn torrent(provider: &str, title: &str, info_hash: &str) -> TorrentDescription {
        TorrentDescription {
            size: 1024 * 1024 * 100, // 100 MB
            seeds: 50,
            peers: 10,
            ..TorrentDescription::new(provider, title)
                .with_magnet(format!("magnet:?xt=urn:btih:{}", info_hash))
        }
    }

    /// Create a torrent that still needs resolving (no magnet, no hash).
    pub fn unresolved_torrent(provider: &str, title: &str) -> TorrentDescription {
        TorrentDescription {
            info_url: Some(format!(
                "https://{}.example/torrent/{}",
                provider,
                title.to_lowercase().replace(' ', "-")
            )),
            seeds: 5,
            ..TorrentDescription::new(provider, title)
        }
    }

    /// The Big Buck Bunny torrent as `provider` would return it.
    pub fn big_buck_bunny(provider: &str) -> TorrentDescription {
        TorrentDescription {
            themoviedb_id: Some(10378),
            imdb_id: Some("tt1254207".to_string()),
            ..torrent(provider, "Big Buck Bunny", BIG_BUCK_BUNNY_HASH)
        }
    }

    /// `count` numbered torrents, for pagination tests.
    pub fn numbered_torrents(provider: &str, prefix: &str, count: usize) -> Vec<TorrentDescription> {
        (1..=count)
            .map(|i| {
                torrent(
                    provider,
                    &format!("{} {}", prefix, i),
                    &format!("{:040x}", i),
                )
            })
            .collect()
    }
}
