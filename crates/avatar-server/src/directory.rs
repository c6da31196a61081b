use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tracing::{debug, warn};

use crate::config::UserDbConfig;
use crate::store::UserDirectory;

/// `UserDirectory` over the external MySQL USERS table.
///
/// Holds connection options only: each lookup opens its own connection and
/// closes it before returning.
pub struct MySqlDirectory {
    options: MySqlConnectOptions,
}

impl MySqlDirectory {
    pub fn new(config: &UserDbConfig) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port);
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }
        Self { options }
    }
}

#[async_trait]
impl UserDirectory for MySqlDirectory {
    async fn resolve_user_id(&self, username: &str, company_id: i64) -> Result<Option<i64>> {
        let mut conn = MySqlConnection::connect_with(&self.options)
            .await
            .context("failed to connect to user database")?;

        let result = sqlx::query_scalar::<_, i64>(
            "SELECT CAST(USER_ID AS SIGNED) FROM USERS WHERE USER_ABBR = ? AND COMP_ID = ?",
        )
        .bind(username)
        .bind(company_id)
        .fetch_optional(&mut conn)
        .await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close user database connection: {}", e);
        }

        let user_id = result.context("user id query failed")?;
        debug!(username, company_id, found = user_id.is_some(), "user id lookup");
        Ok(user_id)
    }
}
