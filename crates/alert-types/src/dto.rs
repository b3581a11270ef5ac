//! Request and response DTOs for the administrative API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete delivery target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub guild_id: String,
    pub channel_id: String,
}

/// Outcome of a successful unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsubscribed {
    /// Nodes removed by the prune sweep that followed.
    pub pruned_nodes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlerterRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedKey {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyCount {
    pub count: usize,
}

/// Base response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    #[serde(default = "default_code")]
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn default_code() -> i32 {
    200
}

impl<T> BaseResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

pub type TargetsResponse = BaseResponse<BTreeMap<String, String>>;
pub type ChannelsResponse = BaseResponse<Vec<ChannelTarget>>;
pub type AlertersResponse = BaseResponse<Vec<String>>;
