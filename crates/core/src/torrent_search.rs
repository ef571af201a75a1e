//! Entry point: provider registry, provider selection and lifecycle.

use futures::future::{join_all, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TorrentProviderCache;
use crate::config::{validate_config, Config, ConfigError};
use crate::provider::{default_providers, Credentials, TorrentProvider};
use crate::search::{
    panic_message, ErrorCause, ResolveFailure, ResolveResult, ResolveResultSet, SearchResult,
    TorrentDescription, TorrentQuery, TorrentQueryBuilder,
};
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum TorrentSearchError {
    #[error("TorrentSearch has been disposed")]
    Disposed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Searches every enabled provider at once.
///
/// Built-in providers are registered first, followed by caller supplied
/// ones. A provider registered under an existing name replaces the earlier
/// one in place. After `dispose` every operation returns
/// `TorrentSearchError::Disposed` and the registry is empty, so providers
/// and the transport they share are released.
pub struct TorrentSearch {
    providers: RwLock<Vec<Arc<dyn TorrentProvider>>>,
    cache: Option<Arc<dyn TorrentProviderCache>>,
    /// Parent scope of every search started here.
    token: CancellationToken,
    disposed: AtomicBool,
}

impl TorrentSearch {
    pub fn new(
        cache: Option<Arc<dyn TorrentProviderCache>>,
        transport: HttpTransport,
        install_default_providers: bool,
        providers: Vec<Arc<dyn TorrentProvider>>,
    ) -> Self {
        let mut registry: Vec<Arc<dyn TorrentProvider>> = Vec::new();
        let defaults = if install_default_providers {
            default_providers(&transport, cache.clone())
        } else {
            Vec::new()
        };

        for provider in defaults.into_iter().chain(providers) {
            let existing = registry.iter().position(|p| p.name() == provider.name());
            match existing {
                Some(index) => {
                    debug!(provider = %provider.name(), "Replacing registered provider");
                    registry[index] = provider;
                }
                None => registry.push(provider),
            }
        }

        info!(
            providers = registry.len(),
            enabled = registry.iter().filter(|p| p.is_enabled()).count(),
            "TorrentSearch created"
        );

        Self {
            providers: RwLock::new(registry),
            cache,
            token: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Built-in providers over a default transport.
    pub fn with_defaults(
        cache: Option<Arc<dyn TorrentProviderCache>>,
    ) -> Result<Self, TorrentSearchError> {
        let transport = HttpTransport::with_defaults()?;
        Ok(Self::new(cache, transport, true, Vec::new()))
    }

    /// Build from configuration, applying per-provider overrides.
    pub fn from_config(
        config: &Config,
        cache: Option<Arc<dyn TorrentProviderCache>>,
        providers: Vec<Arc<dyn TorrentProvider>>,
    ) -> Result<Self, TorrentSearchError> {
        validate_config(config)?;
        let transport = HttpTransport::from_config(&config.http)?;
        let search = Self::new(cache, transport, config.install_default_providers, providers);

        for (name, overrides) in &config.providers {
            let Some(provider) = search.find(name) else {
                warn!(provider = %name, "Ignoring configuration for unknown provider");
                continue;
            };
            match overrides.enabled {
                Some(true) => provider.enable(Credentials::new(
                    overrides.username.clone(),
                    overrides.password.clone(),
                    overrides.cookies.clone(),
                )),
                Some(false) => provider.disable(),
                None => {}
            }
        }

        Ok(search)
    }

    /// Start a search on every enabled provider that supports the query's
    /// category.
    ///
    /// Must be called within a Tokio runtime.
    pub fn search(&self, query: TorrentQuery) -> Result<SearchResult, TorrentSearchError> {
        self.ensure_active()?;

        let selected: Vec<Arc<dyn TorrentProvider>> = self
            .registry()
            .iter()
            .filter(|p| p.is_enabled() && p.supports_category(query.category))
            .cloned()
            .collect();

        debug!(
            providers = selected.len(),
            page = query.page,
            category = ?query.category,
            "Starting search"
        );

        Ok(SearchResult::new(
            &self.token,
            selected,
            self.cache.clone(),
            query,
            Vec::new(),
        ))
    }

    /// `search` with the query described by a builder closure.
    pub fn search_with(
        &self,
        build: impl FnOnce(TorrentQueryBuilder) -> TorrentQueryBuilder,
    ) -> Result<SearchResult, TorrentSearchError> {
        self.search(build(TorrentQuery::builder()).build())
    }

    /// Resolve torrents through the providers that returned them.
    ///
    /// Torrents are grouped by provider and each group is resolved
    /// concurrently. A provider failing or panicking yields an
    /// `UnknownError` carrying its original torrents; torrents from unknown
    /// providers are skipped.
    pub async fn resolve(
        &self,
        torrents: &[TorrentDescription],
    ) -> Result<ResolveResultSet, TorrentSearchError> {
        self.ensure_active()?;

        let mut groups: Vec<(Arc<dyn TorrentProvider>, Vec<TorrentDescription>)> = Vec::new();
        for torrent in torrents {
            if let Some((_, group)) = groups
                .iter_mut()
                .find(|(provider, _)| provider.name() == torrent.provider)
            {
                group.push(torrent.clone());
                continue;
            }
            match self.find(&torrent.provider) {
                Some(provider) => groups.push((provider, vec![torrent.clone()])),
                None => debug!(provider = %torrent.provider, "Skipping unknown provider"),
            }
        }

        let results = join_all(
            groups
                .into_iter()
                .map(|(provider, torrents)| resolve_group(provider, torrents)),
        )
        .await;

        Ok(ResolveResultSet::new(results))
    }

    /// All registered providers in registration order.
    pub fn providers(&self) -> Result<Vec<Arc<dyn TorrentProvider>>, TorrentSearchError> {
        self.ensure_active()?;
        Ok(self.registry().clone())
    }

    /// Registered providers that are currently enabled.
    pub fn enabled_providers(&self) -> Result<Vec<Arc<dyn TorrentProvider>>, TorrentSearchError> {
        self.ensure_active()?;
        Ok(self
            .registry()
            .iter()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect())
    }

    pub fn provider(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn TorrentProvider>>, TorrentSearchError> {
        self.ensure_active()?;
        Ok(self.find(name))
    }

    /// Enable `name` with `credentials`; unknown names are ignored.
    pub fn enable_provider(
        &self,
        name: &str,
        credentials: Credentials,
    ) -> Result<(), TorrentSearchError> {
        self.ensure_active()?;
        if let Some(provider) = self.find(name) {
            provider.enable(credentials);
            info!(provider = %name, "Provider enabled");
        }
        Ok(())
    }

    /// Disable `name`; unknown names are ignored.
    pub fn disable_provider(&self, name: &str) -> Result<(), TorrentSearchError> {
        self.ensure_active()?;
        if let Some(provider) = self.find(name) {
            provider.disable();
            info!(provider = %name, "Provider disabled");
        }
        Ok(())
    }

    /// Cancel every outstanding search and release the providers.
    ///
    /// Searches still running keep their own provider handles until their
    /// tasks observe the cancellation.
    pub fn dispose(&self) -> Result<(), TorrentSearchError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(TorrentSearchError::Disposed);
        }
        self.token.cancel();
        let released = std::mem::take(
            &mut *self
                .providers
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        info!(providers = released.len(), "TorrentSearch disposed");
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<(), TorrentSearchError> {
        if self.is_disposed() {
            Err(TorrentSearchError::Disposed)
        } else {
            Ok(())
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn TorrentProvider>>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, name: &str) -> Option<Arc<dyn TorrentProvider>> {
        self.registry().iter().find(|p| p.name() == name).cloned()
    }
}

impl Drop for TorrentSearch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn resolve_group(
    provider: Arc<dyn TorrentProvider>,
    torrents: Vec<TorrentDescription>,
) -> ResolveResult {
    let name = provider.name().to_string();
    let outcome = AssertUnwindSafe(provider.resolve(&torrents))
        .catch_unwind()
        .await;

    let (message, cause) = match outcome {
        Ok(Ok(result)) => return result,
        Ok(Err(e)) => {
            let message = e.to_string();
            let cause: ErrorCause = Arc::new(e);
            (message, Some(cause))
        }
        Err(panic) => (panic_message(panic.as_ref()), None),
    };

    warn!(provider = %name, error = %message, "Provider resolve failed");
    ResolveResult::Error(ResolveFailure::UnknownError {
        provider_name: name,
        message,
        cause,
        torrents,
    })
}
