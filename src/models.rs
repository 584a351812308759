//! Response payloads

use serde::Serialize;

pub const HEALTH_STATUS: &str = "online";
pub const HEALTH_MESSAGE: &str = "Guestbook API is running. Use /guestbook to fetch data.";
pub const DELETED_MESSAGE: &str = "Deleted successfully";

/// Static payload for `GET /`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl HealthResponse {
    pub fn online() -> Self {
        Self {
            status: HEALTH_STATUS,
            message: HEALTH_MESSAGE,
        }
    }
}

/// Message-only response (no data)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
