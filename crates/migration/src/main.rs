//! Applies the accounts schema. Run with the usual sea-orm-migration
//! subcommands (`up`, `down`, `status`, `fresh`).
//!
//! The database is resolved the same way the server resolves it: the
//! `database_url` key from an optional `config.yaml`, overridden by
//! `DATABASE_URL` in the environment.

use config::{Config, ConfigError, Environment, File};
use sea_orm_migration::prelude::*;
use std::env;

fn configured_database_url() -> Result<Option<String>, ConfigError> {
    let settings = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;
    match settings.get_string("database_url") {
        Ok(url) => Ok(Some(url)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    if let Some(url) = configured_database_url()? {
        env::set_var("DATABASE_URL", url);
    }
    cli::run_cli(migration::Migrator).await;
    Ok(())
}
