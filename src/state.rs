use std::sync::Arc;

use reqwest::Client;

use super::{config::Config, database::Database};

pub struct AppState {
    pub config: Config,
    pub database: Database,
    pub http: Client,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let database = Database::open(&config.database_path)?;

        Ok(Self::with_database(config, database))
    }

    pub fn with_database(config: Config, database: Database) -> Arc<Self> {
        Arc::new(Self {
            config,
            database,
            http: Client::new(),
        })
    }
}
