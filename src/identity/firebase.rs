use std::env;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::identity::{Identity, IdentityProvider, TokenSlot};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Clone, Debug)]
pub struct IdentityConfig {
    pub api_key: String,
    pub base_url: String,
}

impl IdentityConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_key = env::var("FIREBASE_API_KEY")
            .map_err(|_| AppError::BadRequest("FIREBASE_API_KEY is not set".to_string()))?;
        let base_url = env::var("IDENTITY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self { api_key, base_url })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordRequest<'a> {
    id_token: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Email/password accounts over the Identity Toolkit REST API.
pub struct FirebaseIdentity {
    client: Client,
    config: IdentityConfig,
    token: TokenSlot,
    session: watch::Sender<Option<Identity>>,
}

impl FirebaseIdentity {
    pub fn new(config: IdentityConfig, token: TokenSlot) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        let (session, _) = watch::channel(None);
        Ok(Self {
            client,
            config,
            token,
            session,
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, AppError> {
        let raw = format!("{}/accounts:{}", self.config.base_url.trim_end_matches('/'), method);
        let mut url = Url::parse(&raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid identity url {}: {}", raw, e)))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<AccountResponse, AppError> {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("Identity request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(map_error(&text));
        }

        serde_json::from_str::<AccountResponse>(&text).map_err(|e| {
            tracing::error!("Failed to parse identity response: {}", e);
            AppError::Unavailable(format!("Failed to parse identity response: {}", e))
        })
    }
}

/// Identity Toolkit reports failures as an upper-case code in `message`,
/// sometimes followed by ` : <detail>`.
fn map_error(body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    let code = message.split(':').next().unwrap_or_default().trim();

    match code {
        "EMAIL_EXISTS" => AppError::Conflict("Email is already in use".to_string()),
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "EMAIL_NOT_FOUND" | "USER_DISABLED" => {
            AppError::InvalidCredentials
        }
        "WEAK_PASSWORD" => AppError::WeakPassword,
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => AppError::Unauthenticated,
        _ => AppError::Unavailable(format!("Identity provider error: {}", message)),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let account = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        self.token.set(account.id_token).await;
        let identity = Identity {
            uid: account.local_id,
            email: account.email,
        };
        info!("Signed in as {}", identity.email);
        self.session.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.token.set(None).await;
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
        // The sign-up token belongs to the new account; it is dropped here so
        // the primary session keeps its own.
        let account = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        debug!("Provisioned account {} for {}", account.local_id, email);
        Ok(Identity {
            uid: account.local_id,
            email: account.email,
        })
    }

    async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AppError> {
        let identity = self.current().ok_or(AppError::Unauthenticated)?;

        let fresh = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email: &identity.email,
                    password: current_password,
                    return_secure_token: true,
                },
            )
            .await?;
        let id_token = fresh.id_token.ok_or_else(|| {
            warn!("Re-authentication returned no token for {}", identity.email);
            AppError::Unauthenticated
        })?;

        let updated = self
            .call(
                "update",
                &UpdatePasswordRequest {
                    id_token: &id_token,
                    password: new_password,
                    return_secure_token: true,
                },
            )
            .await?;

        self.token.set(updated.id_token.or(Some(id_token))).await;
        info!("Password changed for {}", identity.email);
        Ok(())
    }
}
