pub mod friendship;
pub mod message;
pub mod transfer;

use std::sync::Arc;

use wren_db::Database;
use wren_types::error::ServiceError;

use crate::registry::SessionRegistry;
use crate::router::ConversationRouter;

pub use friendship::FriendshipService;
pub use message::MessageService;
pub use transfer::TransferService;

/// All gateway services, wired up once at startup and shared by every
/// connection. Explicit construction instead of globals so tests can
/// build them against in-memory stores and fresh registries.
pub struct Services {
    pub messages: MessageService,
    pub transfers: TransferService,
    pub friendships: FriendshipService,
}

impl Services {
    pub fn new(db: Arc<Database>, registry: SessionRegistry) -> Self {
        let router = ConversationRouter::new(db.clone(), registry.clone());
        Self {
            messages: MessageService::new(db.clone(), router),
            transfers: TransferService::new(db.clone(), registry.clone()),
            friendships: FriendshipService::new(db, registry),
        }
    }
}

/// Run a blocking store call off the async runtime, folding both join
/// and store failures into `ServiceError::Persistence`.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ServiceError::Persistence),
        Err(join) => Err(ServiceError::Persistence(anyhow::anyhow!(
            "blocking store task failed: {}",
            join
        ))),
    }
}
