use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use wren_types::events::ServerEvent;

/// One live connection bound to a logical user.
#[derive(Debug)]
struct Session {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
    connected_at: DateTime<Utc>,
}

/// Single source of truth for "is this user online". Maps each user id
/// to its current live connection handle. At most one session per user
/// is authoritative at any instant: a newer bind for the same user
/// supersedes the old entry, and an unbind from the superseded
/// connection must not evict its successor.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<i64, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record (or overwrite) the live handle for a user. Returns the
    /// connection id used for the supersession check on unbind, and
    /// the receiving half the connection loop drains into its socket.
    pub async fn bind(&self, user_id: i64) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            conn_id,
            tx,
            connected_at: Utc::now(),
        };
        self.inner.write().await.insert(user_id, session);
        (conn_id, rx)
    }

    /// Remove the mapping, but only if `conn_id` still owns it. Returns
    /// the session's connect time when the entry was removed — `None`
    /// means a newer connection took over and nothing was touched.
    pub async fn unbind(&self, user_id: i64, conn_id: Uuid) -> Option<DateTime<Utc>> {
        let mut sessions = self.inner.write().await;
        match sessions.get(&user_id) {
            Some(session) if session.conn_id == conn_id => sessions
                .remove(&user_id)
                .map(|session| session.connected_at),
            _ => None,
        }
    }

    /// Push an event to the user's live session, if any. Returns whether
    /// a live handle accepted it; offline users are silently skipped.
    pub async fn send_to_user(&self, user_id: i64, event: ServerEvent) -> bool {
        let sessions = self.inner.read().await;
        match sessions.get(&user_id) {
            Some(session) => session.tx.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
