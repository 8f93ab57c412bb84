use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::services::session::DEFAULT_ADMIN_EMAIL;
use crate::services::{AttendanceService, DataService, MemorizationService, RosterService, SessionService};
use crate::store::RecordStore;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub admin_email: String,
    pub database_url: String,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://halaqat.db?mode=rwc".to_string());
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|_| AppError::BadRequest("BIND_ADDR is not a socket address".to_string()))?;

        Ok(Self {
            admin_email,
            database_url,
            bind_addr,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub data: Arc<DataService>,
    pub session: Arc<SessionService>,
    pub roster: Arc<RosterService>,
    pub attendance: Arc<AttendanceService>,
    pub memorization: Arc<MemorizationService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        db: SqlitePool,
        admin_email: &str,
    ) -> Self {
        let data = Arc::new(DataService::new(store));
        Self {
            session: Arc::new(SessionService::new(
                identity.clone(),
                data.clone(),
                db.clone(),
                admin_email,
            )),
            roster: Arc::new(RosterService::new(data.clone(), identity)),
            attendance: Arc::new(AttendanceService::new(data.clone())),
            memorization: Arc::new(MemorizationService::new(data.clone())),
            db,
            data,
        }
    }
}
