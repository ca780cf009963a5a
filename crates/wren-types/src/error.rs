use thiserror::Error;

/// Failure taxonomy for the gateway services. Validation failures are
/// normal outcomes reported back to the originating session; only
/// `Persistence` indicates something actually went wrong in the store.
/// None of these ever tear down the server or other sessions.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("You are not a member of this conversation")]
    NotAMember,

    #[error("User not found")]
    UserNotFound,

    #[error("You cannot send a friend request to yourself")]
    SelfRequest,

    #[error("You are already friends with this user")]
    AlreadyFriends,

    #[error("Friend request already sent")]
    DuplicatePending,

    #[error("This request has already been answered")]
    InvalidState,

    #[error("storage failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl ServiceError {
    /// Human-readable reason safe to show to the end user. Store errors
    /// are collapsed to a generic message; the details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Persistence(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
