use serde::{Deserialize, Serialize};

// -- Envelopes --

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess {
    pub success: bool,
    pub message: String,
}

impl ApiSuccess {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// -- User id lookup --

/// Query string of `GET /api/user-id`. Both fields are optional at the
/// extractor level so a missing one surfaces as our own 400 body instead of
/// axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct UserIdQuery {
    pub username: Option<String>,
    #[serde(rename = "companyId")]
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdResponse {
    pub success: bool,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

// -- Health --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub port: u16,
}
