use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 6001;
const DEFAULT_DB_PATH: &str = "sqlite/data/mydb.sqlite";
const DEFAULT_MYSQL_HOST: &str = "localhost";
const DEFAULT_MYSQL_PORT: u16 = 3307;

/// Service settings, built once in `main` and handed to each accessor.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file holding the AVATARS table.
    pub db_path: PathBuf,
    pub users: UserDbConfig,
}

/// Connection settings for the external USERS database.
#[derive(Clone)]
pub struct UserDbConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let port = parse_port(get("AVATAR_PORT"), DEFAULT_PORT, "AVATAR_PORT")?;
        let mysql_port = parse_port(get("MYSQL_PORT"), DEFAULT_MYSQL_PORT, "MYSQL_PORT")?;

        Ok(Self {
            host: get("AVATAR_HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
            port,
            db_path: get("AVATAR_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.into())
                .into(),
            users: UserDbConfig {
                host: get("MYSQL_HOST").unwrap_or_else(|| DEFAULT_MYSQL_HOST.into()),
                port: mysql_port,
                user: get("MYSQL_USER"),
                password: get("MYSQL_PASSWORD"),
                database: get("MYSQL_DATABASE"),
            },
        })
    }
}

fn parse_port(value: Option<String>, default: u16, key: &str) -> Result<u16> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a port number, got {v:?}")),
        None => Ok(default),
    }
}
