//! Database row types. These map directly to SQLite rows and stay distinct
//! from the avatar-types models to keep the DB layer independent.

use avatar_types::models::Avatar;
use chrono::NaiveDateTime;

pub struct AvatarRow {
    pub user_id: i64,
    pub avatar_image: Vec<u8>,
    pub avatar_upload_date: NaiveDateTime,
}

impl From<AvatarRow> for Avatar {
    fn from(row: AvatarRow) -> Self {
        Avatar {
            user_id: row.user_id,
            image: row.avatar_image,
            uploaded_at: row.avatar_upload_date,
        }
    }
}
