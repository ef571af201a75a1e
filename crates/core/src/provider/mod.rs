//! Torrent provider abstraction and the built-in providers.
//!
//! A provider is one indexing backend behind the `TorrentProvider` trait.
//! Built-in providers share one `HttpTransport` and keep their enablement in
//! a `ProviderState`.

mod eztv;
pub mod html;
mod libre;
mod nyaa;
mod piratebay;
mod rarbg;
mod state;
mod throttle;
mod traits;
mod x1337;
mod yts;

pub use eztv::EztvProvider;
pub use libre::LibreProvider;
pub use nyaa::NyaaProvider;
pub use piratebay::PirateBayProvider;
pub use rarbg::RarbgProvider;
pub use state::{Credentials, ProviderState};
pub use throttle::RequestThrottle;
pub use traits::*;
pub use x1337::X1337Provider;
pub use yts::YtsProvider;

use std::sync::Arc;

use crate::cache::TorrentProviderCache;
use crate::transport::HttpTransport;

/// The built-in providers in registration order.
///
/// Rarbg starts disabled; the others start enabled.
pub fn default_providers(
    transport: &HttpTransport,
    cache: Option<Arc<dyn TorrentProviderCache>>,
) -> Vec<Arc<dyn TorrentProvider>> {
    vec![
        Arc::new(LibreProvider::new()),
        Arc::new(YtsProvider::new(transport.clone())),
        Arc::new(EztvProvider::new(transport.clone())),
        Arc::new(PirateBayProvider::new(transport.clone())),
        Arc::new(X1337Provider::new(transport.clone())),
        Arc::new(NyaaProvider::new(transport.clone())),
        Arc::new(RarbgProvider::new(transport.clone(), cache)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers_order_and_enablement() {
        let transport = HttpTransport::with_defaults().unwrap();
        let providers = default_providers(&transport, None);

        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["libre", "yts", "eztv", "thepiratebay", "1337x", "nyaa", "rarbg"]
        );

        let disabled: Vec<&str> = providers
            .iter()
            .filter(|p| !p.is_enabled())
            .map(|p| p.name())
            .collect();
        assert_eq!(disabled, vec!["rarbg"]);
    }

    #[test]
    fn test_category_support() {
        let transport = HttpTransport::with_defaults().unwrap();
        let eztv = EztvProvider::new(transport.clone());
        let piratebay = PirateBayProvider::new(transport);

        assert!(eztv.supports_category(None));
        assert!(eztv.supports_category(Some(crate::search::Category::All)));
        assert!(eztv.supports_category(Some(crate::search::Category::Tv)));
        assert!(!eztv.supports_category(Some(crate::search::Category::Movies)));
        assert!(piratebay.supports_category(Some(crate::search::Category::Movies)));
        assert!(!piratebay.supports_category(Some(crate::search::Category::Books)));
    }
}
