use serde::{Deserialize, Serialize};

// -- Conversations --

/// One row of a user's conversation list, with a preview of the most
/// recent message.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub last_message: Option<String>,
}

// -- Messages --

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub user_id: i64,
}

// -- Bank --

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: i64,
    pub receiver_name: String,
    pub amount: f64,
    pub conversation_id: i64,
    pub status: String,
    pub timestamp: String,
}

// -- Friends --

#[derive(Debug, Clone, Serialize)]
pub struct FriendView {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_online: bool,
}

/// A pending incoming friend request, with enough about the sender to
/// render the accept/reject prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestView {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
}
