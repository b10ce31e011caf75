use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;
use r2d2_postgres::{PostgresConnectionManager, TlsMode};
use serde::Deserialize;
use url::Url;

use infra::memory::{MemStore, MemoryConnectionManager};
use infra::persistence::{DocumentConnectionManager, UseSchema};

pub const ENV_PREFIX: &str = "RESTAURANTS_";

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Postgres(PostgresConfig),
    Memory(MemoryConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PostgresConfig {
    pub url: Url,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Keep documents in this schema rather than the connection default.
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_size")]
    pub max_size: u32,
}

/// What to provision when the store is first seen empty.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    pub on_startup: bool,
    /// Seed roles and the admin principal as well as sample restaurants.
    pub identity: bool,
    pub admin_email: String,
    pub admin_credential: String,
    pub owner_email: String,
}

/// `RESTAURANTS_*` variables that take precedence over the file.
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub postgres_url: Option<Url>,
    pub seed_on_startup: Option<bool>,
    pub admin_email: Option<String>,
    pub admin_credential: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct EnvLogger {
    level: Option<LogLevel>,
    modules: HashMap<String, LogLevel>,
    timestamp_nanos: bool,
}

fn default_max_size() -> u32 {
    4
}

fn default_connection_timeout_ms() -> u64 {
    5_000
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            on_startup: true,
            identity: true,
            admin_email: "admin@test.com".to_string(),
            admin_credential: "Password1!".to_string(),
            owner_email: "seed-user@test.com".to_string(),
        }
    }
}

impl Config {
    pub fn apply_env(&mut self) -> Result<()> {
        let overrides = envy::prefixed(ENV_PREFIX)
            .from_env::<EnvOverrides>()
            .context("read environment overrides")?;
        self.apply_overrides(overrides);
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        let EnvOverrides {
            postgres_url,
            seed_on_startup,
            admin_email,
            admin_credential,
        } = overrides;

        if let Some(url) = postgres_url {
            match &mut self.store {
                StoreConfig::Postgres(pg) => pg.url = url,
                StoreConfig::Memory(_) => {
                    warn!("Ignoring {}POSTGRES_URL for a memory store", ENV_PREFIX)
                }
            }
        }
        if let Some(on_startup) = seed_on_startup {
            self.seed.on_startup = on_startup;
        }
        if let Some(email) = admin_email {
            self.seed.admin_email = email;
        }
        if let Some(credential) = admin_credential {
            self.seed.admin_credential = credential;
        }
    }
}

impl PostgresConfig {
    /// Connections are made lazily, so an unreachable database surfaces on
    /// first use rather than here.
    pub fn build(&self) -> Result<Pool<DocumentConnectionManager>> {
        let mut redacted = self.url.clone();
        let _ = redacted.set_password(None);
        debug!("Build pool for {} (max {})", redacted, self.max_size);

        let manager = PostgresConnectionManager::new(self.url.as_str(), TlsMode::None)
            .with_context(|| format!("postgres url {}", redacted))?;

        let mut builder = r2d2::Pool::builder()
            .max_size(self.max_size)
            .connection_timeout(Duration::from_millis(self.connection_timeout_ms));
        if let Some(schema) = &self.schema {
            builder = builder.connection_customizer(Box::new(UseSchema::new(schema)));
        }
        debug!("Pool builder: {:?}", builder);
        Ok(builder.build_unchecked(DocumentConnectionManager::new(manager)))
    }
}

impl MemoryConfig {
    pub fn build(&self) -> Pool<MemoryConnectionManager> {
        debug!("Build in-memory pool (max {})", self.max_size);
        r2d2::Pool::builder()
            .max_size(self.max_size)
            .build_unchecked(MemoryConnectionManager::new(MemStore::new()))
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level {
            b.filter_level(level.into());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(module, (*level).into());
        }

        if self.timestamp_nanos {
            b.format_timestamp_nanos();
        }

        b
    }
}
