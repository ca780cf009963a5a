/// Database row types — these map directly to SQLite rows.
/// Distinct from the wren-types API/wire structs so the store layer
/// stays independent of the protocol surface.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub balance: f64,
    pub is_online: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct ConversationSummaryRow {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionRow {
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

#[derive(Debug, Clone)]
pub struct FriendRequestRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PendingRequestRow {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
}

#[derive(Debug, Clone)]
pub struct FriendRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_online: bool,
}

/// Result of the atomic balance-transfer unit. The refusals are normal
/// outcomes, not errors: either the sender does not belong to the
/// conversation the payment message would land in, or the debit's
/// WHERE clause failed to match. Both abandon the unit with zero
/// writes.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Completed {
        transaction_id: i64,
        message_id: i64,
    },
    InsufficientFunds,
    NotAMember,
}

/// Result of settling a friend request. `AlreadySettled` covers both
/// terminal states — a request can only be actioned once.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    Accepted {
        sender_id: i64,
        receiver_id: i64,
        conversation_id: i64,
    },
    Rejected,
    AlreadySettled,
    NotFound,
}
