use std::sync::Arc;

use tracing::info;

use wren_db::Database;
use wren_db::models::SettleOutcome;
use wren_types::error::ServiceError;
use wren_types::events::{FriendStatus, NotificationKind, ServerEvent};

use crate::registry::SessionRegistry;
use crate::services::run_blocking;

/// The friend-request handshake: request -> accept/reject, with a
/// one-on-one conversation provisioned on acceptance.
pub struct FriendshipService {
    db: Arc<Database>,
    registry: SessionRegistry,
}

impl FriendshipService {
    pub fn new(db: Arc<Database>, registry: SessionRegistry) -> Self {
        Self { db, registry }
    }

    /// Open a request addressed by username or email. The sender gets a
    /// success response; the receiver's live session, if any, gets a
    /// notification.
    pub async fn send_request(
        &self,
        sender_id: i64,
        receiver_handle: String,
    ) -> Result<(), ServiceError> {
        let db = self.db.clone();
        let handle = receiver_handle.clone();
        let receiver = run_blocking(move || db.find_user_by_handle(&handle))
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        let receiver_id = receiver.id;

        if receiver_id == sender_id {
            return Err(ServiceError::SelfRequest);
        }

        let db = self.db.clone();
        if run_blocking(move || db.are_friends(sender_id, receiver_id)).await? {
            return Err(ServiceError::AlreadyFriends);
        }

        let db = self.db.clone();
        if run_blocking(move || db.has_pending_request(sender_id, receiver_id)).await? {
            return Err(ServiceError::DuplicatePending);
        }

        let db = self.db.clone();
        let request_id =
            run_blocking(move || db.insert_friend_request(sender_id, receiver_id)).await?;
        info!(
            "friend request {} created: {} -> {} ({})",
            request_id, sender_id, receiver_id, receiver_handle
        );

        self.registry
            .send_to_user(
                sender_id,
                ServerEvent::FriendRequestResponse {
                    success: true,
                    message: "Friend request sent successfully!".to_string(),
                },
            )
            .await;
        self.registry
            .send_to_user(
                receiver_id,
                ServerEvent::NewNotification {
                    kind: NotificationKind::FriendRequest,
                    sender_id,
                },
            )
            .await;

        Ok(())
    }

    /// Accept or reject a pending request. Acceptance is one atomic
    /// store unit (friendship rows, conversation, membership, status
    /// flip) followed by a `friend_status_changed` push to both
    /// parties. Requests already in a terminal state yield
    /// `InvalidState` — they can only be actioned once.
    pub async fn respond(&self, request_id: i64, accept: bool) -> Result<(), ServiceError> {
        let db = self.db.clone();
        let outcome = run_blocking(move || db.settle_friend_request(request_id, accept)).await?;

        match outcome {
            SettleOutcome::Accepted {
                sender_id,
                receiver_id,
                conversation_id,
            } => {
                info!(
                    "friend request {} accepted: {} <-> {}, conversation {} created",
                    request_id, sender_id, receiver_id, conversation_id
                );
                let event = ServerEvent::FriendStatusChanged {
                    status: FriendStatus::FriendAccepted,
                };
                self.registry.send_to_user(sender_id, event.clone()).await;
                self.registry.send_to_user(receiver_id, event).await;
                Ok(())
            }
            SettleOutcome::Rejected => {
                info!("friend request {} rejected", request_id);
                Ok(())
            }
            SettleOutcome::AlreadySettled | SettleOutcome::NotFound => {
                Err(ServiceError::InvalidState)
            }
        }
    }
}
