use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS AVATARS (
            USER_ID             INTEGER     NOT NULL PRIMARY KEY,
            AVATAR_IMAGE        BLOB        NOT NULL,
            AVATAR_UPLOAD_DATE  DATETIME    DEFAULT CURRENT_TIMESTAMP
        );
        ",
    )?;

    info!("AVATARS table ready");
    Ok(())
}
