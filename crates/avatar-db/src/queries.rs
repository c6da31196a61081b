use crate::Database;
use crate::models::AvatarRow;
use anyhow::Result;
use avatar_types::models::AvatarWrite;
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

impl Database {
    // -- Avatars --

    pub fn get_avatar(&self, user_id: i64) -> Result<Option<AvatarRow>> {
        self.with_conn(|conn| query_avatar(conn, user_id))
    }

    /// Insert or replace the avatar for `user_id`, resetting its upload date.
    ///
    /// The existence check and the write share one immediate transaction, so
    /// concurrent uploads for the same user serialize on SQLite's write lock.
    pub fn put_avatar(&self, user_id: i64, image: &[u8]) -> Result<AvatarWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists = tx
                .query_row(
                    "SELECT USER_ID FROM AVATARS WHERE USER_ID = ?1",
                    [user_id],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .is_some();

            let outcome = if exists {
                tx.execute(
                    "UPDATE AVATARS SET AVATAR_IMAGE = ?1, AVATAR_UPLOAD_DATE = CURRENT_TIMESTAMP WHERE USER_ID = ?2",
                    rusqlite::params![image, user_id],
                )?;
                AvatarWrite::Updated
            } else {
                tx.execute(
                    "INSERT INTO AVATARS (USER_ID, AVATAR_IMAGE) VALUES (?1, ?2)",
                    rusqlite::params![user_id, image],
                )?;
                AvatarWrite::Created
            };

            tx.commit()?;

            match outcome {
                AvatarWrite::Created => info!("Created profile picture for user {}", user_id),
                AvatarWrite::Updated => info!("Updated profile picture for user {}", user_id),
            }
            Ok(outcome)
        })
    }

    pub fn count_avatars(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM AVATARS WHERE USER_ID = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }
}

fn query_avatar(conn: &Connection, user_id: i64) -> Result<Option<AvatarRow>> {
    let mut stmt = conn.prepare(
        "SELECT USER_ID, AVATAR_IMAGE, AVATAR_UPLOAD_DATE FROM AVATARS WHERE USER_ID = ?1",
    )?;

    let row = stmt
        .query_row([user_id], |row| {
            Ok(AvatarRow {
                user_id: row.get(0)?,
                avatar_image: row.get(1)?,
                avatar_upload_date: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
