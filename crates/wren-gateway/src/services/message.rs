use std::sync::Arc;

use tracing::debug;

use wren_db::Database;
use wren_types::error::ServiceError;
use wren_types::events::{MessageKind, ServerEvent};

use crate::router::ConversationRouter;
use crate::services::run_blocking;

/// Persists chat messages and fans them out to live conversation
/// members. Never touches balances.
pub struct MessageService {
    db: Arc<Database>,
    router: ConversationRouter,
}

impl MessageService {
    pub fn new(db: Arc<Database>, router: ConversationRouter) -> Self {
        Self { db, router }
    }

    /// Insert a text message, then notify every live member — the
    /// sender included, so all of a user's own views stay in sync.
    /// Delivery only runs after the insert succeeds; a store failure
    /// aborts the whole operation with nothing pushed.
    pub async fn send(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: String,
    ) -> Result<(), ServiceError> {
        let db = self.db.clone();
        let member = run_blocking(move || db.is_member(conversation_id, sender_id)).await?;
        if !member {
            return Err(ServiceError::NotAMember);
        }

        let db = self.db.clone();
        let body = content.clone();
        let message_id = run_blocking(move || {
            db.insert_message(conversation_id, sender_id, &body, MessageKind::Text)
        })
        .await?;

        let delivered = self
            .router
            .deliver(
                conversation_id,
                ServerEvent::NewMessage {
                    conversation_id,
                    sender_id,
                    content,
                },
                None,
            )
            .await
            .map_err(ServiceError::Persistence)?;

        debug!(
            "message {} in conversation {} delivered to {} live sessions",
            message_id, conversation_id, delivered
        );
        Ok(())
    }
}
