use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::JobRun;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub total_items: u64,
    pub items_by_type: HashMap<String, u64>,
    pub clients: u64,
    pub scheduler_enabled: bool,
    pub tmdb_enabled: bool,
    pub claude_enabled: bool,
    pub last_media_sync: Option<JobRun>,
    pub last_list_sync: Option<JobRun>,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub q: Option<String>,
    pub year: Option<i32>,
    pub client_id: Option<i32>,
    pub page: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataSearchQuery {
    pub q: String,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaSyncRequest {
    #[serde(default)]
    pub client_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: i32,
    pub deleted: bool,
}
