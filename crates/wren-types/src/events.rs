use serde::{Deserialize, Serialize};

/// Events sent FROM a client TO the server over the gateway socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to a logged-in user. Must be the first event
    /// on a fresh connection; everything else is ignored until it arrives.
    UserConnected { user_id: i64 },

    /// Post a text message into a conversation
    SendMessage {
        conversation_id: i64,
        sender_id: i64,
        content: String,
    },

    /// Transfer money to another user inside a conversation
    SendMoney {
        sender_id: i64,
        receiver_id: i64,
        amount: f64,
        conversation_id: i64,
    },

    /// Open a friend-request handshake, addressed by username or email
    SendFriendRequest {
        sender_id: i64,
        receiver_username: String,
    },

    /// Accept or reject a pending friend request
    RespondFriendRequest { request_id: i64, accept: bool },
}

/// Events pushed FROM the server TO live client sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message was posted in a conversation the recipient belongs to.
    /// Sent to every live member, the author included, so all of a
    /// user's views stay in sync.
    NewMessage {
        conversation_id: i64,
        sender_id: i64,
        content: String,
    },

    /// Outcome of a money transfer, delivered to the initiating session only
    MoneySent {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        amount: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Money arrived; delivered to the receiver's live session
    MoneyReceived {
        success: bool,
        amount: f64,
        conversation_id: i64,
    },

    /// Something happened that the target user should look at
    NewNotification {
        kind: NotificationKind,
        sender_id: i64,
    },

    /// Outcome of a friend-request operation, delivered to the initiator
    FriendRequestResponse { success: bool, message: String },

    /// A friendship changed state; both parties refresh their lists
    FriendStatusChanged { status: FriendStatus },

    /// A request failed in a way that has no dedicated response event
    Error { context: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendStatus {
    FriendAccepted,
}

/// Message rows are either plain text or the payment marker the
/// transfer path inserts alongside a completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Payment,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Payment => "payment",
        }
    }
}
