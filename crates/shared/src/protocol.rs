use serde::{Deserialize, Serialize};

use crate::domain::{Intensity, TriggerCode};

/// Client → server frame on the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPress {
    pub button_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    #[default]
    Ok,
}

/// Server → client acknowledgment of a press that reached the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonAck {
    pub status: AckStatus,
    pub button_index: i64,
    pub note: TriggerCode,
}

impl ButtonAck {
    pub fn ok(button_index: i64, note: TriggerCode) -> Self {
        Self {
            status: AckStatus::Ok,
            button_index,
            note,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonView {
    pub note: TriggerCode,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Intensity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub buttons: Vec<ButtonView>,
}
