pub mod firebase;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{RwLock, watch};

use crate::error::AppError;

pub use firebase::{FirebaseIdentity, IdentityConfig};
pub use memory::InMemoryIdentity;

/// An authenticated account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// ID token of the signed-in user, shared between the identity provider
/// (which writes it) and the record store (which sends it as a bearer token).
#[derive(Clone, Default)]
pub struct TokenSlot(Arc<RwLock<Option<String>>>);

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, token: Option<String>) {
        *self.0.write().await = token;
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    fn current(&self) -> Option<Identity>;

    /// Session-change notifications; the value is `None` while signed out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Creates a new account without touching the current session.
    /// Fails with `Conflict` when the email is taken and `WeakPassword`
    /// when the provider rejects the password.
    async fn provision_account(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    /// Re-authenticates the current user with `current_password`, then sets
    /// `new_password`.
    async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AppError>;
}
