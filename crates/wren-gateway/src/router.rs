use std::sync::Arc;

use anyhow::Result;
use tracing::trace;

use wren_db::Database;
use wren_types::events::ServerEvent;

use crate::registry::SessionRegistry;

/// Resolves conversation membership and fans an event out to every
/// member with a live session. Members without one are silently
/// skipped — there is no queuing; offline clients recover history from
/// the store on their next read.
#[derive(Clone)]
pub struct ConversationRouter {
    db: Arc<Database>,
    registry: SessionRegistry,
}

impl ConversationRouter {
    pub fn new(db: Arc<Database>, registry: SessionRegistry) -> Self {
        Self { db, registry }
    }

    /// Membership comes straight from the store on every call; no cache.
    pub async fn members_of(&self, conversation_id: i64) -> Result<Vec<i64>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.conversation_members(conversation_id)).await?
    }

    /// Deliver `event` to every live member of the conversation, minus
    /// `exclude` if given. Returns how many live sessions accepted it.
    pub async fn deliver(
        &self,
        conversation_id: i64,
        event: ServerEvent,
        exclude: Option<i64>,
    ) -> Result<usize> {
        let members = self.members_of(conversation_id).await?;

        let mut delivered = 0;
        for user_id in members {
            if exclude == Some(user_id) {
                continue;
            }
            if self.registry.send_to_user(user_id, event.clone()).await {
                delivered += 1;
            }
        }

        trace!(
            "delivered event to {} live members of conversation {}",
            delivered, conversation_id
        );
        Ok(delivered)
    }
}
