pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod email;
pub mod entitlement;
pub mod fcm;
pub mod models;

use sqlx::PgPool;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
}
