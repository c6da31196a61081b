use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A stored profile picture. `image` is always JPEG-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub user_id: i64,
    pub image: Vec<u8>,
    pub uploaded_at: NaiveDateTime,
}

/// Outcome of an avatar write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarWrite {
    Created,
    Updated,
}
