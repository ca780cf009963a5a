//! REST read surface for the data the clients render between gateway
//! pushes: conversation lists, message history, the ledger, balances,
//! and the friends/pending-requests views. Everything here is a
//! snapshot read (plus the mark-read flag flip); all mutation of
//! balances and relationships goes through the gateway services.

pub mod bank;
pub mod conversations;
pub mod friends;

use std::sync::Arc;

use wren_db::Database;

pub type ApiState = Arc<ApiStateInner>;

pub struct ApiStateInner {
    pub db: Arc<Database>,
}
