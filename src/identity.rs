use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The signed-in user's login email. Doubles as the display name on messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// `None` for a blank identifier.
    pub fn new(email: impl Into<String>) -> Option<Self> {
        let email = email.into();
        let trimmed = email.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::SignedIn(id) => Some(id),
            AuthState::SignedOut => None,
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> AuthState;

    /// Receives every sign-in/sign-out transition.
    fn watch(&self) -> watch::Receiver<AuthState>;

    fn sign_out(&self);
}

/// Identity held in-process, e.g. taken from the command line or config.
pub struct LocalIdentity {
    state: watch::Sender<AuthState>,
}

impl LocalIdentity {
    pub fn signed_out() -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self { state }
    }

    pub fn signed_in(identity: Identity) -> Self {
        let (state, _) = watch::channel(AuthState::SignedIn(identity));
        Self { state }
    }

    pub fn sign_in(&self, identity: Identity) {
        log::info!("signed in as {identity}");
        self.state.send_replace(AuthState::SignedIn(identity));
    }
}

impl IdentityProvider for LocalIdentity {
    fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn sign_out(&self) {
        let previous = self.state.send_replace(AuthState::SignedOut);
        if let AuthState::SignedIn(identity) = previous {
            log::info!("signed out {identity}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identity_is_rejected() {
        assert_eq!(Identity::new("   "), None);
        assert_eq!(Identity::new(" a@x.com ").unwrap().as_str(), "a@x.com");
    }

    #[tokio::test]
    async fn transitions_reach_watchers() {
        let provider = LocalIdentity::signed_out();
        let mut rx = provider.watch();
        assert_eq!(provider.current(), AuthState::SignedOut);

        provider.sign_in(Identity::new("a@x.com").unwrap());
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().identity().map(Identity::as_str),
            Some("a@x.com")
        );

        provider.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AuthState::SignedOut);
    }
}
