pub mod api;
pub mod db;
pub mod derive;
pub mod error;
pub mod identity;
pub mod models;
pub mod remediation;
pub mod services;
pub mod state;
pub mod store;
