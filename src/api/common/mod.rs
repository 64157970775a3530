//! Pieces shared by every API version.

pub mod tracing;

use serde::{Deserialize, Serialize};

/// Body for endpoints that only acknowledge an action.
#[derive(Debug, Serialize, Deserialize)]
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
