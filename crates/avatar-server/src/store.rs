use anyhow::{Context, Result};
use async_trait::async_trait;

use avatar_db::Database;
use avatar_types::models::{Avatar, AvatarWrite};

/// Where profile pictures live.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn get_avatar(&self, user_id: i64) -> Result<Option<Avatar>>;

    /// Insert, or replace image and upload time if one already exists.
    async fn put_avatar(&self, user_id: i64, image: Vec<u8>) -> Result<AvatarWrite>;
}

/// Read-only lookup of user ids owned by another service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_user_id(&self, username: &str, company_id: i64) -> Result<Option<i64>>;
}

// SQLite calls block, so they run on the blocking pool.
#[async_trait]
impl AvatarStore for Database {
    async fn get_avatar(&self, user_id: i64) -> Result<Option<Avatar>> {
        let db = self.clone();
        let row = tokio::task::spawn_blocking(move || Database::get_avatar(&db, user_id))
            .await
            .context("avatar lookup task failed")??;
        Ok(row.map(Avatar::from))
    }

    async fn put_avatar(&self, user_id: i64, image: Vec<u8>) -> Result<AvatarWrite> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || Database::put_avatar(&db, user_id, &image))
            .await
            .context("avatar write task failed")?
    }
}
