//! Authentication session as seen by the cart.
//!
//! The cart only needs to know who the current user is and when that
//! changes. Authentication itself happens elsewhere; whatever performs it
//! calls [`AuthSession::sign_in`] / [`AuthSession::sign_out`].

use std::sync::Arc;

use cartsync_core::UserId;
use tokio::sync::watch;

/// Supplies the identity of the current user, if any.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` for a guest.
    fn current_user(&self) -> Option<UserId>;
}

/// Current user identity with change notification.
///
/// Cheap to clone; clones share the same identity.
#[derive(Debug, Clone)]
pub struct AuthSession {
    identity: Arc<watch::Sender<Option<UserId>>>,
}

impl AuthSession {
    /// A guest session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: Arc::new(watch::Sender::new(None)),
        }
    }

    /// A session that starts signed in.
    #[must_use]
    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            identity: Arc::new(watch::Sender::new(Some(user_id))),
        }
    }

    /// Record a successful login.
    pub fn sign_in(&self, user_id: UserId) {
        tracing::info!(user_id = %user_id, "Signed in");
        self.identity.send_replace(Some(user_id));
    }

    /// Record a logout.
    pub fn sign_out(&self) {
        if self.identity.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Receive identity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.identity.subscribe()
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for AuthSession {
    fn current_user(&self) -> Option<UserId> {
        self.identity.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_by_default() {
        let session = AuthSession::new();
        assert!(!session.is_authenticated());
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_sign_in_and_out() {
        let session = AuthSession::new();
        let clone = session.clone();

        session.sign_in(UserId::new("u1"));
        assert_eq!(clone.current_user(), Some(UserId::new("u1")));

        clone.sign_out();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let session = AuthSession::new();
        let mut rx = session.subscribe();

        session.sign_in(UserId::new("u1"));
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow_and_update(), Some(UserId::new("u1")));
    }

    #[test]
    fn test_authenticated_constructor() {
        let session = AuthSession::authenticated(UserId::new("u2"));
        assert_eq!(session.current_user(), Some(UserId::new("u2")));
    }
}
