use crate::domain_model::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum C2SCommand {
    Join(JoinGroup),
    Leave(LeaveGroup),
    SendMessage(SendMessage),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinGroup {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveGroup {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum S2CEvent {
    ReceiveMessage(DirectMessageRecord),
    ReceiveNotification(NotificationRecord),
    Error(SoftError),
}

/// In-band failure report. The connection stays open; only the one call failed.
#[derive(Debug, Serialize, Deserialize)]
pub struct SoftError {
    pub message: String,
}
