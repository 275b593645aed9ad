pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod notifications;
pub mod stats;

pub use db::DbPool;

use config::Config;
use notifications::ResetMailer;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub mailer: Arc<dyn ResetMailer>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, mailer: Arc<dyn ResetMailer>) -> Self {
        Self { config, db, mailer }
    }
}
