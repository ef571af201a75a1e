use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Credentials passed when enabling a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub cookies: Vec<String>,
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>, cookies: Vec<String>) -> Self {
        Self {
            username,
            password,
            cookies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.cookies.is_empty()
    }
}

/// Enablement flag and credentials shared by provider implementations.
///
/// Toggling is visible to later searches only; a query already in flight
/// keeps running.
#[derive(Debug)]
pub struct ProviderState {
    enabled: AtomicBool,
    credentials: RwLock<Credentials>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProviderState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            credentials: RwLock::new(Credentials::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable, replacing stored credentials when new ones are given.
    pub fn enable(&self, credentials: Credentials) {
        if !credentials.is_empty() {
            *self
                .credentials
                .write()
                .unwrap_or_else(PoisonError::into_inner) = credentials;
        }
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stored cookies joined into a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        let credentials = self.credentials();
        if credentials.cookies.is_empty() {
            None
        } else {
            Some(credentials.cookies.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable() {
        let state = ProviderState::new(false);
        assert!(!state.is_enabled());

        state.enable(Credentials::default());
        assert!(state.is_enabled());

        state.disable();
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_enable_keeps_credentials_when_none_given() {
        let state = ProviderState::default();
        state.enable(Credentials::new(
            Some("user".to_string()),
            Some("secret".to_string()),
            vec!["a=1".to_string(), "b=2".to_string()],
        ));
        state.disable();
        state.enable(Credentials::default());

        let credentials = state.credentials();
        assert_eq!(credentials.username.as_deref(), Some("user"));
        assert_eq!(state.cookie_header().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn test_no_cookie_header_without_cookies() {
        let state = ProviderState::default();
        assert!(state.cookie_header().is_none());
    }
}
