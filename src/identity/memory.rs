use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AppError;
use crate::identity::{Identity, IdentityProvider};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    uid: String,
    password: String,
}

/// Identity provider backed by a map of accounts, for tests and local runs.
pub struct InMemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    session: watch::Sender<Option<Identity>>,
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an account with a known uid.
    pub fn add_account(&self, uid: &str, email: &str, password: &str) {
        self.accounts().insert(
            email.to_lowercase(),
            Account {
                uid: uid.to_string(),
                password: password.to_string(),
            },
        );
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts().contains_key(&email.to_lowercase())
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.accounts()
            .get(&email.to_lowercase())
            .map(|a| a.password.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let identity = {
            let accounts = self.accounts();
            let account = accounts
                .get(&email.to_lowercase())
                .filter(|a| a.password == password)
                .ok_or(AppError::InvalidCredentials)?;
            Identity {
                uid: account.uid.clone(),
                email: email.to_string(),
            }
        };
        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }

    async fn provision_account(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let mut accounts = self.accounts();
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(AppError::Conflict("Email is already in use".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::WeakPassword);
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();
        accounts.insert(
            key,
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        Ok(Identity {
            uid,
            email: email.to_string(),
        })
    }

    async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AppError> {
        let identity = self.current().ok_or(AppError::Unauthenticated)?;
        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&identity.email.to_lowercase())
            .ok_or(AppError::Unauthenticated)?;

        if account.password != current_password {
            return Err(AppError::InvalidCredentials);
        }
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::WeakPassword);
        }
        account.password = new_password.to_string();
        Ok(())
    }
}
